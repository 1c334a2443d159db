//! Test filtering for cotest.
//!
//! A filter decides which tests from the input slice are part of the run.
//! Tests that do not match are deselected after collection: a deselected
//! member leaves its concurrent group, and a group without members is
//! dropped from the run entirely.
//!
//! This is different to ignoring: ignored tests still go through the run and
//! are reported as skipped during setup.

use crate::test::Test;

mod no;
pub use no::*;

mod default;
pub use default::*;

/// The result of applying a [`TestFilter`].
///
/// This contains an iterator over the tests that are included in the run,
/// as well as the number of tests that were filtered out.
#[derive(Debug)]
pub struct FilteredTests<'t, I, Extra>
where
    I: ExactSizeIterator<Item = &'t Test<Extra>>,
    Extra: 't,
{
    /// The tests that are included in the run.
    pub tests: I,

    /// The number of tests that were filtered out.
    pub filtered_out: usize,
}

/// A strategy for selecting which tests are included in a test run.
pub trait TestFilter<Extra> {
    /// Filter the given slice of tests.
    ///
    /// The iterator must yield references into the original `tests` slice.
    fn filter<'t>(
        &self,
        tests: &'t [Test<Extra>],
    ) -> FilteredTests<'t, impl ExactSizeIterator<Item = &'t Test<Extra>>, Extra>;
}

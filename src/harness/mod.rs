use std::io;

pub use test::TestHarness;

use crate::{
    event_loop::Interrupt, filter::DefaultFilter, fixture::FixtureRegistry,
    ignore::DefaultIgnore, reporter::PrettyReporter, test::Test,
};

pub fn harness<'t, Extra>(
    tests: &'t [Test<Extra>],
) -> TestHarness<'t, Extra, DefaultFilter, DefaultIgnore, PrettyReporter<io::Stdout>> {
    TestHarness {
        tests,
        fixtures: FixtureRegistry::new(),
        filter: DefaultFilter::default(),
        ignore: DefaultIgnore::Default,
        reporter: PrettyReporter::default(),
        interrupt: Interrupt::new(),
    }
}

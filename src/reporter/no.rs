use crate::reporter::TestReporter;

/// A reporter that produces no output.
///
/// Reports are still collected into the [`RunReport`](crate::RunReport), so
/// this is useful when the caller inspects the outcomes on its own.
#[derive(Debug, Default, Clone)]
pub struct NoReporter;

impl TestReporter for NoReporter {
    type Error = ();
}

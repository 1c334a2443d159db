use std::{
    borrow::Cow,
    fmt::{self, Display},
    thread,
    time::{Duration, Instant, SystemTime},
};

use crate::{
    error::Error,
    fixture::FixtureError,
    panic::payload_as_string,
    test::{TestError, TestResult},
};

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TestStatus {
    Passed,
    Skipped { reason: Option<Cow<'static, str>> },
    Failed(TestFailure),
}

impl TestStatus {
    pub fn is_good(&self) -> bool {
        matches!(self, TestStatus::Passed | TestStatus::Skipped { .. })
    }

    pub fn is_bad(&self) -> bool {
        matches!(self, TestStatus::Failed(_))
    }

    pub fn passed(&self) -> bool {
        matches!(self, TestStatus::Passed)
    }

    pub fn skipped(&self) -> bool {
        matches!(self, TestStatus::Skipped { .. })
    }

    pub fn failed(&self) -> bool {
        matches!(self, TestStatus::Failed(_))
    }

    pub fn failure(&self) -> Option<&TestFailure> {
        match self {
            TestStatus::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<Result<(), TestFailure>> for TestStatus {
    fn from(value: Result<(), TestFailure>) -> Self {
        match value {
            Ok(()) => TestStatus::Passed,
            Err(failure) => TestStatus::Failed(failure),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TestFailure {
    Error(String),
    Panicked(String),
    TimedOut { after: Duration },
    Fixture(FixtureError),

    /// Several failures of one phase, for example from more than one finalizer.
    Multiple(Vec<TestFailure>),
}

impl TestFailure {
    /// Fold collected failures into one, keeping every one of them.
    pub fn combine(mut failures: Vec<TestFailure>) -> Option<TestFailure> {
        match failures.len() {
            0 => None,
            1 => failures.pop(),
            _ => Some(TestFailure::Multiple(failures)),
        }
    }

    /// The number of single failures this failure is made of.
    pub fn count(&self) -> usize {
        match self {
            TestFailure::Multiple(failures) => failures.iter().map(TestFailure::count).sum(),
            _ => 1,
        }
    }
}

impl Display for TestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestFailure::Error(err) => write!(f, "Error: {err}"),
            TestFailure::Panicked(msg) => write!(f, "panicked: {msg}"),
            TestFailure::TimedOut { after } => {
                write!(f, "timed out after {:.3}s", after.as_secs_f64())
            }
            TestFailure::Fixture(err) => write!(f, "{err}"),
            TestFailure::Multiple(failures) => {
                writeln!(f, "{} errors:", failures.len())?;
                for failure in failures {
                    writeln!(f, "  - {failure}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<FixtureError> for TestFailure {
    fn from(value: FixtureError) -> Self {
        TestFailure::Fixture(value)
    }
}

/// Timing and status of one phase of one test.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PhaseOutcome {
    pub start: SystemTime,
    pub stop: SystemTime,
    pub duration: Duration,
    pub status: TestStatus,
}

/// The outcome of running a test body.
pub type CallOutcome = PhaseOutcome;

pub(crate) struct Stopwatch {
    start: SystemTime,
    precise_start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            start: SystemTime::now(),
            precise_start: Instant::now(),
        }
    }

    pub fn finish(self, status: impl Into<TestStatus>) -> PhaseOutcome {
        let duration = self.precise_start.elapsed();
        PhaseOutcome {
            start: self.start,
            stop: SystemTime::now(),
            duration,
            status: status.into(),
        }
    }
}

/// Turn what a test body produced into its call status.
///
/// An abort is the only result that does not become a status.
pub(crate) fn call_status(test: &str, caught: thread::Result<TestResult>) -> Result<TestStatus, Error> {
    match caught {
        Err(payload) => Ok(TestStatus::Failed(TestFailure::Panicked(payload_as_string(
            payload,
        )))),
        Ok(TestResult(Ok(()))) => Ok(TestStatus::Passed),
        Ok(TestResult(Err(TestError::Failed(msg)))) => {
            Ok(TestStatus::Failed(TestFailure::Error(msg)))
        }
        Ok(TestResult(Err(TestError::Skipped(reason)))) => Ok(TestStatus::Skipped { reason }),
        Ok(TestResult(Err(TestError::Abort(reason)))) => Err(Error::Aborted {
            test: test.to_string(),
            reason,
        }),
    }
}

use std::{
    borrow::Cow,
    fmt::{self, Display},
    process::{ExitCode, Termination},
    time::{Duration, SystemTime},
};

use crate::{outcome::TestStatus, test::SuitePath, warning::TestWarning};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Setup,
    Call,
    Teardown,
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Setup => "setup",
            Phase::Call => "call",
            Phase::Teardown => "teardown",
        })
    }
}

/// The report of one phase of one test.
///
/// Tests of a concurrent group produce the same reports a sequential run
/// would, there is no report for the group itself.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct TestReport {
    pub name: Cow<'static, str>,
    pub suite: SuitePath,
    pub phase: Phase,
    pub status: TestStatus,
    pub start: SystemTime,
    pub stop: SystemTime,
    pub duration: Duration,
}

impl TestReport {
    /// The category this report counts towards, if any.
    pub fn outcome(&self) -> Option<Outcome> {
        match (self.phase, &self.status) {
            (Phase::Setup | Phase::Teardown, TestStatus::Failed(_)) => Some(Outcome::Error),
            (Phase::Setup | Phase::Call, TestStatus::Skipped { .. }) => Some(Outcome::Skipped),
            (Phase::Call, TestStatus::Passed) => Some(Outcome::Passed),
            (Phase::Call, TestStatus::Failed(_)) => Some(Outcome::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Passed,
    Failed,
    Error,
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub warnings: usize,
}

impl OutcomeCounts {
    pub fn count<'r>(reports: impl IntoIterator<Item = &'r TestReport>, warnings: usize) -> Self {
        let mut counts = OutcomeCounts {
            warnings,
            ..Default::default()
        };
        for report in reports {
            match report.outcome() {
                Some(Outcome::Passed) => counts.passed += 1,
                Some(Outcome::Failed) => counts.failed += 1,
                Some(Outcome::Error) => counts.errors += 1,
                Some(Outcome::Skipped) => counts.skipped += 1,
                None => (),
            }
        }
        counts
    }

    pub fn is_ok(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

impl Display for OutcomeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [
            (self.failed, "failed"),
            (self.passed, "passed"),
            (self.skipped, "skipped"),
            (self.warnings, "warnings"),
            (self.errors, "errors"),
        ];
        let mut written = false;
        for (count, label) in parts.into_iter().filter(|(count, _)| *count > 0) {
            if written {
                f.write_str(", ")?;
            }
            write!(f, "{count} {label}")?;
            written = true;
        }
        if !written {
            f.write_str("no tests ran")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub struct RunReport<ReportError> {
    pub reports: Vec<TestReport>,
    pub warnings: Vec<TestWarning>,
    pub duration: Duration,
    pub filtered_out: usize,
    pub report_errors: Vec<(&'static str, ReportError)>,
}

impl<ReportError> RunReport<ReportError> {
    pub fn summary(&self) -> OutcomeCounts {
        OutcomeCounts::count(&self.reports, self.warnings.len())
    }

    pub fn find(&self, name: &str, phase: Phase) -> Option<&TestReport> {
        self.reports
            .iter()
            .find(|report| report.name == name && report.phase == phase)
    }

    pub fn reports_for<'r>(&'r self, name: &'r str) -> impl Iterator<Item = &'r TestReport> {
        self.reports.iter().filter(move |report| report.name == name)
    }

    pub fn exit_code(&self) -> ExitCode {
        match self.summary().is_ok() {
            true => ExitCode::SUCCESS,
            false => ExitCode::FAILURE,
        }
    }
}

impl<ReportError> Termination for RunReport<ReportError> {
    fn report(self) -> ExitCode {
        self.exit_code()
    }
}

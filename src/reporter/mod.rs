//! Reporting for cotest.
//!
//! The run loop never writes output itself. Every event is published through
//! the [`ReportingAdapter`], collected into the [`RunReport`](crate::RunReport)
//! and sent to a [`TestReporter`] running on its own thread.
//!
//! Members of a concurrent group are reported exactly like tests of a
//! sequential run: one start, one report per phase and one finish each.

use std::time::Duration;

use crate::{
    report::{OutcomeCounts, TestReport},
    test::SuitePath,
    warning::TestWarning,
};

mod adapter;
pub use adapter::*;

pub mod color;

mod no;
pub use no::*;

mod pretty;
pub use pretty::*;

/// Receives report events on the reporter thread.
///
/// Every method defaults to doing nothing.
pub trait TestReporter: Send {
    type Error: Send;

    fn report_run_start(&mut self, tests: usize, filtered_out: usize) -> Result<(), Self::Error> {
        let _ = (tests, filtered_out);
        Ok(())
    }

    fn report_test_start(&mut self, name: &str, suite: &SuitePath) -> Result<(), Self::Error> {
        let _ = (name, suite);
        Ok(())
    }

    fn report_phase(&mut self, report: &TestReport) -> Result<(), Self::Error> {
        let _ = report;
        Ok(())
    }

    fn report_test_finish(&mut self, name: &str, suite: &SuitePath) -> Result<(), Self::Error> {
        let _ = (name, suite);
        Ok(())
    }

    fn report_warning(&mut self, warning: &TestWarning) -> Result<(), Self::Error> {
        let _ = warning;
        Ok(())
    }

    fn report_run_outcomes(
        &mut self,
        reports: &[TestReport],
        counts: &OutcomeCounts,
        duration: Duration,
    ) -> Result<(), Self::Error> {
        let _ = (reports, counts, duration);
        Ok(())
    }
}

macro_rules! named_report {
    ($reporter:ident.$method:ident($($arg:expr),* $(,)?)) => {
        (stringify!($method), $reporter.$method($($arg),*))
    };
}

pub(crate) use named_report;

pub(crate) trait ReportErrors<E> {
    fn push_on_error(&mut self, named: (&'static str, Result<(), E>));
}

impl<E> ReportErrors<E> for Vec<(&'static str, E)> {
    fn push_on_error(&mut self, (name, result): (&'static str, Result<(), E>)) {
        if let Err(err) = result {
            self.push((name, err));
        }
    }
}

impl ReportEvent {
    /// Hand this event to `reporter`.
    pub fn deliver<R: TestReporter>(self, reporter: &mut R) -> (&'static str, Result<(), R::Error>) {
        match self {
            ReportEvent::TestStart { name, suite } => {
                named_report!(reporter.report_test_start(&name, &suite))
            }
            ReportEvent::Phase(report) => named_report!(reporter.report_phase(&report)),
            ReportEvent::TestFinish { name, suite } => {
                named_report!(reporter.report_test_finish(&name, &suite))
            }
            ReportEvent::Warning(warning) => named_report!(reporter.report_warning(&warning)),
        }
    }
}

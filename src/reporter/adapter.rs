use std::borrow::Cow;

use crossbeam_channel::Sender;
use tracing::{debug, warn};

use crate::{
    outcome::PhaseOutcome,
    report::{Phase, TestReport},
    test::{SuitePath, TestMeta},
    warning::TestWarning,
};

/// An event sent from the run loop to the reporter thread.
#[derive(Debug, Clone)]
pub enum ReportEvent {
    TestStart {
        name: Cow<'static, str>,
        suite: SuitePath,
    },
    Phase(TestReport),
    TestFinish {
        name: Cow<'static, str>,
        suite: SuitePath,
    },
    Warning(TestWarning),
}

/// Publishes start, phase and finish events for tests.
///
/// Reports are kept for the final [`RunReport`](crate::RunReport) and
/// forwarded to the reporter thread, if there is one.
#[derive(Debug, Default)]
pub struct ReportingAdapter {
    reports: Vec<TestReport>,
    warnings: Vec<TestWarning>,
    sender: Option<Sender<ReportEvent>>,
}

impl ReportingAdapter {
    pub fn new(sender: Sender<ReportEvent>) -> Self {
        Self {
            sender: Some(sender),
            ..Self::default()
        }
    }

    fn send(&self, event: ReportEvent) {
        if let Some(sender) = &self.sender {
            if sender.send(event).is_err() {
                warn!("reporter thread is gone, dropping report event");
            }
        }
    }

    pub fn start<Extra>(&mut self, meta: &TestMeta<Extra>) {
        self.send(ReportEvent::TestStart {
            name: meta.name.clone(),
            suite: meta.suite.clone(),
        });
    }

    /// Publish the outcome of one phase of one test.
    pub fn report<Extra>(&mut self, meta: &TestMeta<Extra>, phase: Phase, outcome: PhaseOutcome) {
        debug!(test = %meta.name, %phase, status = ?outcome.status, "phase finished");
        let report = TestReport {
            name: meta.name.clone(),
            suite: meta.suite.clone(),
            phase,
            status: outcome.status,
            start: outcome.start,
            stop: outcome.stop,
            duration: outcome.duration,
        };
        self.send(ReportEvent::Phase(report.clone()));
        self.reports.push(report);
    }

    pub fn finish<Extra>(&mut self, meta: &TestMeta<Extra>) {
        self.send(ReportEvent::TestFinish {
            name: meta.name.clone(),
            suite: meta.suite.clone(),
        });
    }

    pub fn warn(&mut self, warning: TestWarning) {
        warn!(%warning, "test warning");
        self.send(ReportEvent::Warning(warning.clone()));
        self.warnings.push(warning);
    }

    pub fn reports(&self) -> &[TestReport] {
        &self.reports
    }

    pub fn warnings(&self) -> &[TestWarning] {
        &self.warnings
    }

    /// Stop forwarding events and hand out what was collected.
    pub fn into_parts(self) -> (Vec<TestReport>, Vec<TestWarning>) {
        (self.reports, self.warnings)
    }
}

use std::sync::{Arc, Mutex};

use cotest::{
    TestReport, harness,
    fixture::{FixtureDef, FixtureResult, FixtureScope},
    reporter::{PrettyReporter, TestReporter},
    test::SuitePath,
    warning::TestWarning,
};
use pretty_assertions::assert_eq;

use crate::{Buffer, init_tracing, member, plain};

#[derive(Debug, Default, Clone)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn push(&self, event: String) -> Result<(), String> {
        let mut events = self.0.lock().map_err(|_| "poisoned".to_string())?;
        events.push(event);
        Ok(())
    }

    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl TestReporter for Recorder {
    type Error = String;

    fn report_test_start(&mut self, name: &str, _: &SuitePath) -> Result<(), Self::Error> {
        self.push(format!("start {name}"))
    }

    fn report_phase(&mut self, report: &TestReport) -> Result<(), Self::Error> {
        self.push(format!("{} {}", report.name, report.phase))
    }

    fn report_test_finish(&mut self, name: &str, _: &SuitePath) -> Result<(), Self::Error> {
        self.push(format!("finish {name}"))
    }

    fn report_warning(&mut self, warning: &TestWarning) -> Result<(), Self::Error> {
        self.push(format!("warning {warning}"))
    }
}

#[test]
fn group_members_are_reported_like_single_tests() {
    init_tracing();
    let tests = [
        plain("before", "mod"),
        member("a", "mod", "G", &[]),
        member("b", "mod", "G", &[]),
    ];

    let recorder = Recorder::default();
    let report = harness(&tests)
        .with_reporter(recorder.clone())
        .run()
        .unwrap();

    assert!(report.report_errors.is_empty());
    assert_eq!(
        recorder.events(),
        [
            "start before",
            "before setup",
            "before call",
            "before teardown",
            "finish before",
            "start a",
            "start b",
            "a setup",
            "b setup",
            "a call",
            "b call",
            "a teardown",
            "b teardown",
            "finish a",
            "finish b",
        ]
    );
}

#[test]
fn pretty_output_for_a_failing_group() {
    init_tracing();
    let tests = [
        member("ok", "mod", "G", &[]),
        member("broken", "mod", "G", &["db"]),
    ];

    let buffer = Buffer::default();
    let report = harness(&tests)
        .with_fixture(FixtureDef::new("db", FixtureScope::Function, |_| -> FixtureResult<()> {
            Err("connection refused".into())
        }))
        .with_reporter(PrettyReporter::default().with_target(buffer.clone()))
        .run()
        .unwrap();

    assert!(!report.summary().is_ok());
    let output = buffer.contents();
    assert!(output.contains("running 2 tests\n"), "{output}");
    assert!(output.contains("test mod::ok ... ok\n"), "{output}");
    assert!(output.contains("test mod::broken ... ERROR at setup\n"), "{output}");
    assert!(output.contains("Error: connection refused"), "{output}");
    assert!(output.contains("test result: FAILED. 1 passed, 1 errors;"), "{output}");
}

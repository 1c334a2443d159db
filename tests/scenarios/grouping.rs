use std::time::Duration;

use cotest::{
    Phase,
    fixture::FixtureRegistry,
    group::GroupKey,
    outcome::{TestFailure, TestStatus},
    test::{ConcurrentMark, Test, TestFnHandle, TestResult},
    warning::TestWarning,
};
use pretty_assertions::assert_eq;

use crate::{member, member_with, meta, plain, run};

async fn nap(millis: u64) -> TestResult {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    TestResult(Ok(()))
}

#[test]
fn members_from_different_suites_are_skipped() {
    let tests = [
        member("a", "mod_a", "G", &[]),
        member("b", "mod_b", "G", &[]),
        plain("c", "mod_a"),
    ];

    let report = run(&tests, FixtureRegistry::new());
    assert_eq!(
        report.warnings,
        [TestWarning::GroupingConflict {
            group: GroupKey::from("G")
        }]
    );
    assert_eq!(report.summary().skipped, 2);
    assert_eq!(report.summary().passed, 1);
    assert!(report.find("a", Phase::Call).is_none());
    assert!(report.find("b", Phase::Teardown).unwrap().status.passed());
}

#[test]
fn sync_member_is_skipped_with_warning() {
    let tests = [
        Test::new(
            TestFnHandle::from_fn(|_| ()),
            meta("sync", "mod", ConcurrentMark::group("G"), &[]),
        ),
        member("async", "mod", "G", &[]),
    ];

    let report = run(&tests, FixtureRegistry::new());
    assert_eq!(
        report.warnings,
        [TestWarning::InvalidMark {
            test: "sync".into()
        }]
    );
    assert_eq!(report.summary().skipped, 1);
    assert_eq!(report.summary().passed, 1);
}

#[test]
fn bodies_of_a_group_overlap() {
    let tests = [
        member_with("a", "G", &[], |_| nap(100)),
        member_with("b", "G", &[], |_| nap(100)),
    ];

    let report = run(&tests, FixtureRegistry::new());
    let a = report.find("a", Phase::Call).unwrap();
    let b = report.find("b", Phase::Call).unwrap();
    assert!(a.start < b.stop && b.start < a.stop);
}

#[test]
fn separate_groups_run_one_after_another() {
    let tests = [
        member_with("a", "G1", &[], |_| nap(50)),
        member_with("b", "G2", &[], |_| nap(50)),
    ];

    let report = run(&tests, FixtureRegistry::new());
    let a = report.find("a", Phase::Call).unwrap();
    let b = report.find("b", Phase::Call).unwrap();
    assert!(a.stop <= b.start);
}

#[test]
fn failures_stay_with_their_member() {
    let mut tests = [
        member_with("fails", "G", &[], |_| async {
            TestResult::from(Err::<(), _>("nope"))
        }),
        member_with("panics", "G", &[], |_| async {
            if true {
                panic!("boom");
            }
            TestResult(Ok(()))
        }),
        member_with("times_out", "G", &[], |_| nap(5_000)),
        member_with("passes", "G", &[], |_| nap(10)),
    ];
    tests[2].meta.concurrent = ConcurrentMark::group("G").with_timeout(Duration::from_millis(30));

    let report = run(&tests, FixtureRegistry::new());
    assert_eq!(report.summary().failed, 3);
    assert_eq!(report.summary().passed, 1);
    assert_eq!(
        report.find("panics", Phase::Call).unwrap().status,
        TestStatus::Failed(TestFailure::Panicked("boom".into()))
    );
    assert_eq!(
        report.find("times_out", Phase::Call).unwrap().status,
        TestStatus::Failed(TestFailure::TimedOut {
            after: Duration::from_millis(30)
        })
    );
}

#[test]
fn skipping_from_a_member_body() {
    let tests = [
        member_with("skips", "G", &[], |_| async { TestResult::skip("no network") }),
        member("passes", "mod", "G", &[]),
    ];

    let report = run(&tests, FixtureRegistry::new());
    assert_eq!(
        report.find("skips", Phase::Call).unwrap().status,
        TestStatus::Skipped {
            reason: Some("no network".into())
        }
    );
    assert_eq!(report.summary().passed, 1);
}

use std::{borrow::Cow, cell::RefCell, rc::Rc};

use cotest::{
    Phase,
    fixture::{FixtureArgs, FixtureDef, FixtureRegistry, FixtureResult, FixtureScope},
    outcome::TestStatus,
    test::{ConcurrentMark, Test, TestFnHandle, TestMeta, TestResult},
};
use pretty_assertions::assert_eq;

use crate::{member, member_with, meta, run};

type Log = Rc<RefCell<Vec<String>>>;

fn broken(name: &'static str, scope: FixtureScope) -> FixtureDef {
    FixtureDef::new(name, scope, |_| -> FixtureResult<()> {
        Err("setup exploded".into())
    })
}

fn broken_teardown(name: &'static str, scope: FixtureScope) -> FixtureDef {
    FixtureDef::yielding(name, scope, |_| {
        Ok(((), || -> FixtureResult<()> { Err("teardown exploded".into()) }))
    })
}

#[test]
fn function_fixture_setup_error() {
    let tests = [
        member("t1", "mod", "G", &[]),
        member("t2", "mod", "G", &["broken"]),
        member("t3", "mod", "G", &[]),
    ];
    let fixtures = FixtureRegistry::new().with(broken("broken", FixtureScope::Function));

    let report = run(&tests, fixtures);
    assert_eq!(report.summary().passed, 2);
    assert_eq!(report.summary().errors, 1);
    assert!(report.find("t2", Phase::Setup).unwrap().status.failed());
    assert!(report.find("t2", Phase::Call).is_none());
}

#[test]
fn failed_setup_still_releases_acquired_fixtures() {
    let log = Log::default();
    let fixture_log = Rc::clone(&log);
    let fixtures = FixtureRegistry::new()
        .with(FixtureDef::yielding("x", FixtureScope::Function, move |request| {
            let log = Rc::clone(&fixture_log);
            let test = request.test().to_string();
            Ok(((), move || -> FixtureResult<()> {
                log.borrow_mut().push(format!("release {test}"));
                Ok(())
            }))
        }))
        .with(broken("y", FixtureScope::Function));
    let tests = [
        member("t1", "mod", "G", &["x"]),
        member("t2", "mod", "G", &["x", "y"]),
    ];

    let report = run(&tests, fixtures);
    assert!(report.find("t2", Phase::Setup).unwrap().status.failed());
    assert!(report.find("t2", Phase::Call).is_none());
    assert!(report.find("t2", Phase::Teardown).unwrap().status.passed());
    assert_eq!(*log.borrow(), ["release t1", "release t2"]);
}

#[test]
fn broad_fixture_setup_error_is_shared() {
    let tests = [
        member("t1", "mod", "G", &["broken"]),
        member("t2", "mod", "G", &[]),
        member("t3", "mod", "G", &["broken"]),
    ];
    let fixtures = FixtureRegistry::new().with(broken("broken", FixtureScope::Suite));

    let report = run(&tests, fixtures);
    assert_eq!(report.summary().passed, 1);
    assert_eq!(report.summary().errors, 2);
}

#[test]
fn suite_wide_fixture_error_hits_every_member() {
    let tests = [
        member("t1", "mod::TestClass", "G", &["broken"]),
        member("t2", "mod::TestClass", "G", &["broken"]),
        member("t3", "mod::TestClass", "G", &["broken"]),
    ];
    let fixtures = FixtureRegistry::new()
        .with(broken("broken", FixtureScope::Function).with_visibility("mod::TestClass"));

    let report = run(&tests, fixtures);
    assert_eq!(report.summary().passed, 0);
    assert_eq!(report.summary().errors, 3);
}

#[test]
fn function_fixture_teardown_error() {
    let tests = [
        member("t1", "mod", "G", &["flaky"]),
        member("t2", "mod", "G", &["flaky"]),
        member("t3", "mod", "G", &[]),
    ];
    let fixtures = FixtureRegistry::new().with(broken_teardown("flaky", FixtureScope::Function));

    let report = run(&tests, fixtures);
    assert_eq!(report.summary().passed, 3);
    assert_eq!(report.summary().errors, 2);
    assert!(report.find("t1", Phase::Teardown).unwrap().status.failed());
    assert!(report.find("t2", Phase::Teardown).unwrap().status.failed());
    assert!(report.find("t3", Phase::Teardown).unwrap().status.passed());
}

#[test]
fn broad_fixture_teardown_error_lands_on_last_member() {
    let tests = [
        member("t1", "mod", "G", &["flaky"]),
        member("t2", "mod", "G", &["flaky"]),
        member("t3", "mod", "G", &["flaky"]),
    ];
    let fixtures = FixtureRegistry::new().with(broken_teardown("flaky", FixtureScope::Suite));

    let report = run(&tests, fixtures);
    assert_eq!(report.summary().passed, 3);
    assert_eq!(report.summary().errors, 1);
    assert!(report.find("t3", Phase::Teardown).unwrap().status.failed());
}

#[test]
fn async_generator_yielding_twice_fails_teardown() {
    let tests = [member("t1", "mod", "G", &["gen"])];
    let fixtures = FixtureRegistry::new().with(FixtureDef::async_yielding(
        "gen",
        FixtureScope::Function,
        |_| futures::stream::iter([FixtureResult::Ok(1u32), Ok(2)]),
    ));

    let report = run(&tests, fixtures);
    assert!(report.find("t1", Phase::Call).unwrap().status.passed());
    let teardown = &report.find("t1", Phase::Teardown).unwrap().status;
    let failure = teardown.failure().unwrap().to_string();
    assert!(failure.contains("didn't stop, yield only once"), "{failure}");
}

#[test]
fn members_get_their_own_function_values() {
    let created = Rc::new(RefCell::new(0u32));
    let counter = Rc::clone(&created);
    let fixtures = FixtureRegistry::new().with(FixtureDef::new(
        "counter",
        FixtureScope::Function,
        move |_| {
            *counter.borrow_mut() += 1;
            Ok(*counter.borrow())
        },
    ));

    let seen = Rc::new(RefCell::new(Vec::new()));
    let body = |seen: Rc<RefCell<Vec<u32>>>| {
        TestFnHandle::from_async(move |args| {
            let seen = Rc::clone(&seen);
            async move {
                let value = args.get::<u32>("counter").unwrap();
                seen.borrow_mut().push(*value);
            }
        })
    };
    let tests = [
        Test::new(body(Rc::clone(&seen)), meta("a", "mod", ConcurrentMark::group("G"), &["counter"])),
        Test::new(body(Rc::clone(&seen)), meta("b", "mod", ConcurrentMark::group("G"), &["counter"])),
    ];

    let report = run(&tests, fixtures);
    assert_eq!(report.summary().passed, 2);
    assert_eq!(*seen.borrow(), [1, 2]);
}

#[test]
fn mutations_stay_inside_one_member() {
    let fixtures = FixtureRegistry::new().with(FixtureDef::new(
        "state",
        FixtureScope::Function,
        |_| Ok(RefCell::new(Vec::<&'static str>::new())),
    ));
    let writer = |name: &'static str| {
        member_with(name, "G", &["state"], move |args: FixtureArgs| async move {
            let seen = match args.get::<RefCell<Vec<&'static str>>>("state") {
                Ok(state) => {
                    state.borrow_mut().push(name);
                    tokio::task::yield_now().await;
                    state.take()
                }
                Err(err) => return TestResult::from(Err::<(), _>(err)),
            };
            match seen == [name] {
                true => TestResult(Ok(())),
                false => TestResult::from(Err::<(), _>(format!("{name} saw {seen:?}"))),
            }
        })
    };
    let tests = [writer("a"), writer("b")];

    let report = run(&tests, fixtures);
    assert_eq!(report.summary().passed, 2);
    assert_eq!(report.summary().failed, 0);
}

#[test]
fn grouped_and_plain_tests_share_a_function_fixture() {
    let log = Log::default();
    let created = Rc::new(RefCell::new(0u32));
    let fixture_log = Rc::clone(&log);
    let fixtures = FixtureRegistry::new().with(FixtureDef::yielding(
        "conn",
        FixtureScope::Function,
        move |_| {
            *created.borrow_mut() += 1;
            let id = *created.borrow();
            let log = Rc::clone(&fixture_log);
            Ok((id, move || -> FixtureResult<()> {
                log.borrow_mut().push(format!("close {id}"));
                Ok(())
            }))
        },
    ));

    let sync_user = |name: &'static str, log: Log| {
        Test::new(
            TestFnHandle::from_fn(move |args| {
                let id = args.get::<u32>("conn").map_err(|err| err.to_string())?;
                log.borrow_mut().push(format!("use {id}"));
                Ok::<(), String>(())
            }),
            meta(name, "mod", ConcurrentMark::Sequential, &["conn"]),
        )
    };
    let body_log = Rc::clone(&log);
    let tests = [
        sync_user("before", Rc::clone(&log)),
        member_with("grouped", "G", &["conn"], move |args: FixtureArgs| {
            let log = Rc::clone(&body_log);
            async move {
                let id = args.get::<u32>("conn").map_err(|err| err.to_string());
                TestResult::from(id.map(|id| log.borrow_mut().push(format!("use {id}"))))
            }
        }),
        sync_user("after", Rc::clone(&log)),
    ];

    let report = run(&tests, fixtures);
    assert_eq!(report.summary().passed, 3);
    assert_eq!(
        *log.borrow(),
        ["use 1", "close 1", "use 2", "close 2", "use 3", "close 3"]
    );
}

#[test]
fn members_with_different_parameters_keep_their_values() {
    let log = Log::default();
    let fixture_log = Rc::clone(&log);
    let fixtures = FixtureRegistry::new().with(FixtureDef::yielding(
        "p",
        FixtureScope::Function,
        move |request| {
            let param = request.param().unwrap_or_default();
            fixture_log.borrow_mut().push(format!("setup {param}"));
            let log = Rc::clone(&fixture_log);
            Ok((param, move || -> FixtureResult<()> {
                log.borrow_mut().push(format!("teardown {param}"));
                Ok(())
            }))
        },
    ));

    let caller = |name: &'static str, callspec: &'static [(&'static str, usize)], log: Log| {
        let body = TestFnHandle::from_async(move |args: FixtureArgs| {
            let log = Rc::clone(&log);
            async move {
                let param = args.get::<usize>("p").map_err(|err| err.to_string());
                TestResult::from(param.map(|param| log.borrow_mut().push(format!("call {name} {param}"))))
            }
        });
        Test::new(
            body,
            TestMeta {
                callspec: Cow::Borrowed(callspec),
                ..meta(name, "mod", ConcurrentMark::group("G"), &["p"])
            },
        )
    };
    let tests = [
        caller("a", &[("p", 0)], Rc::clone(&log)),
        caller("b", &[("p", 1)], Rc::clone(&log)),
    ];

    let report = run(&tests, fixtures);
    assert_eq!(report.summary().passed, 2);
    assert_eq!(
        *log.borrow(),
        ["setup 0", "setup 1", "call a 0", "call b 1", "teardown 0", "teardown 1"]
    );
}

#[test]
fn parameters_pick_their_own_value() {
    let fixtures = FixtureRegistry::new().with(FixtureDef::new(
        "db",
        FixtureScope::Session,
        |request| Ok(request.param().unwrap_or_default() * 10),
    ));

    let check = |expected: usize| {
        TestFnHandle::from_fn(move |args| {
            let value = args.get::<usize>("db").map_err(|err| err.to_string())?;
            match *value == expected {
                true => Ok(()),
                false => Err(format!("expected {expected}, got {value}")),
            }
        })
    };
    let with_param = |name: &'static str, callspec: &'static [(&'static str, usize)]| TestMeta {
        callspec: Cow::Borrowed(callspec),
        ..meta(name, "mod", ConcurrentMark::Sequential, &["db"])
    };
    let tests = [
        Test::new(check(0), with_param("first", &[("db", 0)])),
        Test::new(check(10), with_param("second", &[("db", 1)])),
    ];

    let report = run(&tests, fixtures);
    assert_eq!(report.summary().passed, 2);
    assert_eq!(
        report.find("second", Phase::Call).unwrap().status,
        TestStatus::Passed
    );
}

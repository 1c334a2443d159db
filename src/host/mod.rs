//! The host runs single tests and owns the state groups borrow.
//!
//! It keeps the [`SetupState`], resolves fixtures for a test and registers
//! their finalizers on the node matching each fixture's scope.

use std::{
    borrow::Cow,
    collections::BTreeMap,
    panic::{AssertUnwindSafe, catch_unwind},
    rc::Rc,
};

use futures::FutureExt;
use tracing::{debug, warn};

use crate::{
    error::Error,
    event_loop::{EventLoop, Interrupt},
    fixture::{FixtureArgs, FixtureBindings, FixtureError, FixtureRequest, FixtureScope, FixtureValue},
    ignore::IgnoreStatus,
    outcome::{PhaseOutcome, Stopwatch, TestFailure, TestStatus, call_status},
    report::Phase,
    reporter::ReportingAdapter,
    test::{Test, TestFnHandle, TestMeta},
};

mod setup_state;
pub use setup_state::*;

/// The result of setting up one test.
#[derive(Debug)]
pub struct Setup {
    pub outcome: PhaseOutcome,

    /// Resolved fixtures, only present if the setup passed.
    pub args: Option<FixtureArgs>,
}

/// Runs tests against one [`SetupState`] and one [`EventLoop`].
///
/// Single tests go through [`Host::run_single`], group members are set up
/// and torn down by a [`GroupController`](crate::group::GroupController)
/// using the same host.
#[derive(Debug)]
pub struct Host {
    state: SetupState,
    event_loop: Rc<EventLoop>,
    interrupt: Interrupt,
}

impl Host {
    pub fn new(event_loop: Rc<EventLoop>, interrupt: Interrupt) -> Self {
        Self {
            state: SetupState::new(),
            event_loop,
            interrupt,
        }
    }

    pub fn event_loop(&self) -> &Rc<EventLoop> {
        &self.event_loop
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    pub fn state(&self) -> &SetupState {
        &self.state
    }

    /// Push the nodes of `chain`, see [`SetupState::setup`].
    pub fn setup_chain(&mut self, chain: &[Node]) {
        self.state.setup(chain);
    }

    fn in_group(&self) -> bool {
        self.state.frame().is_some()
    }

    fn scope_node<Extra>(scope: FixtureScope, meta: &TestMeta<Extra>) -> Node {
        match scope {
            FixtureScope::Function => Node::test(meta),
            FixtureScope::Suite if !meta.suite.is_root() => Node::Suite(meta.suite.clone()),
            FixtureScope::Module if !meta.suite.is_root() => Node::Suite(meta.suite.prefix(1)),
            FixtureScope::Suite | FixtureScope::Module | FixtureScope::Session => Node::Session,
        }
    }

    /// Set up a test: push its nodes (or enter it as a group member) and
    /// resolve its fixtures.
    pub fn setup_test<Extra>(
        &mut self,
        meta: &TestMeta<Extra>,
        bindings: &FixtureBindings,
        ignore: &IgnoreStatus,
    ) -> Setup {
        let stopwatch = Stopwatch::start();
        match self.in_group() {
            true => self.state.enter_member(Node::test(meta)),
            false => self.state.setup(&Node::test_chain(meta)),
        }

        let reason = match ignore {
            IgnoreStatus::Run => None,
            IgnoreStatus::Ignore => Some(None),
            IgnoreStatus::IgnoreWithReason(reason) => Some(Some(reason.clone())),
        };
        if let Some(reason) = reason {
            return Setup {
                outcome: stopwatch.finish(TestStatus::Skipped { reason }),
                args: None,
            };
        }

        match self.resolve(meta, bindings) {
            Ok(args) => Setup {
                outcome: stopwatch.finish(TestStatus::Passed),
                args: Some(args),
            },
            Err(failure) => {
                debug!(test = %meta.name, %failure, "setup failed");
                Setup {
                    outcome: stopwatch.finish(TestStatus::Failed(failure)),
                    args: None,
                }
            }
        }
    }

    fn resolve<Extra>(
        &mut self,
        meta: &TestMeta<Extra>,
        bindings: &FixtureBindings,
    ) -> Result<FixtureArgs, TestFailure> {
        let mut values = BTreeMap::new();
        let mut resolving = Vec::new();
        for &name in meta.fixtures.iter() {
            self.resolve_one(name, meta, bindings, &mut values, &mut resolving)?;
        }

        let args = meta
            .fixtures
            .iter()
            .filter_map(|name| {
                let value = values.get(*name)?;
                Some((Cow::Borrowed(*name), Rc::clone(value)))
            })
            .collect();
        Ok(FixtureArgs(args))
    }

    fn resolve_one<Extra>(
        &mut self,
        name: &'static str,
        meta: &TestMeta<Extra>,
        bindings: &FixtureBindings,
        values: &mut BTreeMap<Cow<'static, str>, FixtureValue>,
        resolving: &mut Vec<&'static str>,
    ) -> Result<(), TestFailure> {
        if values.contains_key(name) {
            return Ok(());
        }
        if resolving.contains(&name) {
            return Err(FixtureError::Recursive {
                name: name.to_string(),
            }
            .into());
        }
        let def = bindings
            .active(name)
            .ok_or_else(|| FixtureError::NotFound {
                name: name.to_string(),
            })?
            .clone();

        resolving.push(name);
        for &dependency in def.depends.iter() {
            self.resolve_one(dependency, meta, bindings, values, resolving)?;
        }
        resolving.pop();

        let request = FixtureRequest {
            fixture: name,
            test: &meta.name,
            param: meta.param(name),
            values,
            event_loop: &self.event_loop,
        };
        let (result, finalizer) = def.execute(&request);
        if let Some(finalizer) = finalizer {
            let node = Self::scope_node(def.scope, meta);
            self.state.add_finalizer(&node, finalizer);
        }

        values.insert(Cow::Borrowed(name), result?);
        Ok(())
    }

    /// Tear down a test towards `next`, the chain of the item run after it.
    ///
    /// Inside a group only the member's own finalizers run.
    pub fn teardown_test<Extra>(&mut self, meta: &TestMeta<Extra>, next: &[Node]) -> PhaseOutcome {
        let stopwatch = Stopwatch::start();
        let result = match self.in_group() {
            true => self.state.teardown_member(&Node::test(meta)),
            false => self.state.teardown_exact(next),
        };
        stopwatch.finish(result)
    }

    /// Unwind the stack of a finished group towards `next`.
    pub fn teardown_group(&mut self, next: &[Node]) -> Result<(), TestFailure> {
        self.state.teardown_exact(next)
    }

    /// Run `f` with a temporary unwind strategy, see [`SetupState::with_unwind_strategy`].
    pub fn with_unwind_strategy<R>(
        &mut self,
        strategy: UnwindStrategy,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let previous = self.state.replace_strategy(strategy);
        let result = f(self);
        self.state.restore_strategy(previous);
        result
    }

    /// The sequential protocol for a test that is not part of a group.
    pub fn run_single<Extra>(
        &mut self,
        test: &Test<Extra>,
        bindings: &FixtureBindings,
        ignore: &IgnoreStatus,
        next: &[Node],
        adapter: &mut ReportingAdapter,
    ) -> Result<(), Error> {
        let meta = &test.meta;
        adapter.start(meta);

        let setup = self.setup_test(meta, bindings, ignore);
        adapter.report(meta, Phase::Setup, setup.outcome);

        if let Some(args) = setup.args {
            let call = self.call(test, args)?;
            adapter.report(meta, Phase::Call, call);
        }

        let teardown = self.teardown_test(meta, next);
        adapter.report(meta, Phase::Teardown, teardown);

        adapter.finish(meta);
        Ok(())
    }

    fn call<Extra>(&self, test: &Test<Extra>, args: FixtureArgs) -> Result<PhaseOutcome, Error> {
        let stopwatch = Stopwatch::start();
        let caught = match test.function() {
            TestFnHandle::Sync(f) => catch_unwind(AssertUnwindSafe(|| f(args))),
            TestFnHandle::Async(f) => {
                let body = catch_unwind(AssertUnwindSafe(|| f(args)));
                match body {
                    Err(payload) => Err(payload),
                    Ok(future) => {
                        let interrupt = self.interrupt.clone();
                        let caught = self.event_loop.block_on(async move {
                            tokio::select! {
                                biased;
                                _ = interrupt.triggered() => None,
                                caught = AssertUnwindSafe(future).catch_unwind() => Some(caught),
                            }
                        });
                        caught.ok_or(Error::Interrupted)?
                    }
                }
            }
        };

        let status = call_status(&test.name, caught)?;
        Ok(stopwatch.finish(status))
    }

    /// Run every finalizer still registered, used when a run ends early.
    pub fn abandon(&mut self) {
        if let Err(failure) = self.state.drain_all() {
            warn!(%failure, "finalizers failed while abandoning the run");
        }
    }
}

use std::{
    borrow::Cow,
    panic::{AssertUnwindSafe, catch_unwind},
};

use futures::{
    FutureExt,
    future::{LocalBoxFuture, try_join_all},
};
use tracing::{debug, warn};

use crate::{
    error::Error,
    event_loop::{EventLoop, Interrupt},
    fixture::FixtureArgs,
    outcome::{CallOutcome, Stopwatch, TestFailure, TestStatus, call_status},
    test::{Test, TestFnHandle},
    warning::TestWarning,
};

/// What the call phase of a group produced.
#[derive(Debug)]
pub struct CallPhase {
    /// One outcome per member, in member order.
    pub outcomes: Vec<CallOutcome>,

    pub warnings: Vec<TestWarning>,
}

/// Runs the bodies of a group's members together on the event loop.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrentScheduler<'h> {
    event_loop: &'h EventLoop,
    interrupt: &'h Interrupt,
}

type Task = LocalBoxFuture<'static, Result<(usize, CallOutcome), Error>>;

impl<'h> ConcurrentScheduler<'h> {
    pub fn new(event_loop: &'h EventLoop, interrupt: &'h Interrupt) -> Self {
        Self {
            event_loop,
            interrupt,
        }
    }

    /// Run every member body concurrently and wait for all of them.
    ///
    /// A failing, panicking or timed out member only affects its own outcome.
    /// An abort from any member or a triggered interrupt cancels every body
    /// still running and is returned as an error.
    pub fn run<Extra>(&self, members: Vec<(&Test<Extra>, FixtureArgs)>) -> Result<CallPhase, Error> {
        let mut outcomes: Vec<Option<CallOutcome>> = Vec::with_capacity(members.len());
        let mut warnings = Vec::new();
        let mut tasks: Vec<Task> = Vec::new();

        for (index, (test, args)) in members.into_iter().enumerate() {
            outcomes.push(None);
            match test.function() {
                TestFnHandle::Sync(_) => {
                    warn!(test = %test.name, "concurrent mark on a sync test");
                    warnings.push(TestWarning::InvalidMark {
                        test: test.name.clone(),
                    });
                    outcomes[index] = Some(Stopwatch::start().finish(TestStatus::Skipped {
                        reason: Some(Cow::Borrowed("concurrent tests must be async")),
                    }));
                }
                TestFnHandle::Async(body) => {
                    let name = test.name.clone();
                    let timeout = test.concurrent.timeout();
                    let future = catch_unwind(AssertUnwindSafe(|| body(args)));
                    tasks.push(
                        async move {
                            let stopwatch = Stopwatch::start();
                            let caught = match future {
                                Err(payload) => Err(payload),
                                Ok(future) => {
                                    let future = AssertUnwindSafe(future).catch_unwind();
                                    match timeout {
                                        None => future.await,
                                        Some(limit) => match tokio::time::timeout(limit, future).await {
                                            Ok(caught) => caught,
                                            Err(_) => {
                                                debug!(test = %name, ?limit, "timed out");
                                                let status = TestStatus::Failed(TestFailure::TimedOut {
                                                    after: limit,
                                                });
                                                return Ok((index, stopwatch.finish(status)));
                                            }
                                        },
                                    }
                                }
                            };
                            call_status(&name, caught).map(|status| (index, stopwatch.finish(status)))
                        }
                        .boxed_local(),
                    );
                }
            }
        }

        debug!(tasks = tasks.len(), "running call phase");
        let interrupt = self.interrupt.clone();
        let finished = self.event_loop.block_on(async move {
            tokio::select! {
                biased;
                _ = interrupt.triggered() => Err(Error::Interrupted),
                finished = try_join_all(tasks) => finished,
            }
        })?;

        for (index, outcome) in finished {
            outcomes[index] = Some(outcome);
        }

        Ok(CallPhase {
            outcomes: outcomes.into_iter().flatten().collect(),
            warnings,
        })
    }
}

use tracing::debug;

use crate::{
    error::Error,
    fixture::FixtureArgs,
    group::{ConcurrentScheduler, Group, GroupKey, MemberStatus},
    host::{GroupFrame, Host, Node, UnwindStrategy},
    ignore::TestIgnore,
    outcome::{Stopwatch, TestFailure, TestStatus},
    report::Phase,
    reporter::ReportingAdapter,
    warning::TestWarning,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupState {
    #[default]
    Idle,
    LoggingStart,
    SettingUp,
    Calling,
    TearingDown,
    LoggingFinish,
    Done,
}

/// Runs one group through its phases.
///
/// Every member gets its own setup, call and teardown report. Members are
/// set up and torn down in insertion order, their bodies run concurrently.
#[derive(Debug)]
pub struct GroupController<'c, Ignore> {
    adapter: &'c mut ReportingAdapter,
    ignore: &'c Ignore,
    state: GroupState,
}

impl<'c, Ignore> GroupController<'c, Ignore> {
    pub fn new(adapter: &'c mut ReportingAdapter, ignore: &'c Ignore) -> Self {
        Self {
            adapter,
            ignore,
            state: GroupState::Idle,
        }
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    fn transition(&mut self, key: &GroupKey, next: GroupState) {
        debug!(group = %key, from = ?self.state, to = ?next, "group state");
        self.state = next;
    }

    /// Run `group` and tear its nodes down towards `next`.
    ///
    /// On an abort the member finalizers still registered are run before the
    /// error is returned. Finish events are not sent in that case.
    pub fn run<Extra>(
        &mut self,
        host: &mut Host,
        mut group: Group<'_, Extra>,
        next: &[Node],
    ) -> Result<(), Error>
    where
        Ignore: TestIgnore<Extra>,
    {
        let key = group.key.clone();

        self.transition(&key, GroupState::LoggingStart);
        for member in group.members.iter() {
            self.adapter.start(&member.test.meta);
        }

        let frame = GroupFrame::new(key.clone());
        host.with_unwind_strategy(UnwindStrategy::Group(frame), |host| {
            self.phases(host, &mut group, next)
        })?;

        self.transition(&key, GroupState::LoggingFinish);
        for member in group.members.iter() {
            self.adapter.finish(&member.test.meta);
        }

        self.transition(&key, GroupState::Done);
        Ok(())
    }

    fn phases<Extra>(
        &mut self,
        host: &mut Host,
        group: &mut Group<'_, Extra>,
        next: &[Node],
    ) -> Result<(), Error>
    where
        Ignore: TestIgnore<Extra>,
    {
        let key = group.key.clone();

        self.transition(&key, GroupState::SettingUp);
        host.setup_chain(&group.chain());
        let mut args: Vec<Option<FixtureArgs>> = Vec::with_capacity(group.len());

        if group.children_have_same_parent {
            for member in group.members.iter_mut() {
                let meta = &member.test.meta;
                let ignore = self.ignore.ignore(meta);
                let setup = host.setup_test(meta, &member.bindings, &ignore);
                member.status = match setup.args.is_some() {
                    true => MemberStatus::SetupPassed,
                    false => MemberStatus::SetupFailed,
                };
                self.adapter.report(meta, Phase::Setup, setup.outcome);
                args.push(setup.args);
            }
        } else {
            self.adapter
                .warn(TestWarning::GroupingConflict { group: key.clone() });
            for member in group.members.iter_mut() {
                let outcome = Stopwatch::start().finish(TestStatus::Skipped {
                    reason: Some("group members come from different suites".into()),
                });
                member.status = MemberStatus::SetupFailed;
                self.adapter.report(&member.test.meta, Phase::Setup, outcome);
                args.push(None);
            }
        }

        self.transition(&key, GroupState::Calling);
        let runnable: Vec<_> = group
            .members
            .iter()
            .zip(args)
            .filter_map(|(member, args)| Some((member.test, args?)))
            .collect();
        let called: Vec<_> = runnable.iter().map(|(test, _)| *test).collect();

        if !runnable.is_empty() {
            let scheduler = ConcurrentScheduler::new(host.event_loop(), host.interrupt());
            let phase = scheduler.run(runnable)?;
            for warning in phase.warnings {
                self.adapter.warn(warning);
            }
            for (test, outcome) in called.into_iter().zip(phase.outcomes) {
                self.adapter.report(&test.meta, Phase::Call, outcome);
                if let Some(member) = group
                    .members
                    .iter_mut()
                    .find(|member| std::ptr::eq(member.test, test))
                {
                    member.status = MemberStatus::Called;
                }
            }
        }

        self.transition(&key, GroupState::TearingDown);
        let mut teardowns = Vec::with_capacity(group.len());
        for member in group.members.iter_mut() {
            teardowns.push(host.teardown_test(&member.test.meta, next));
            member.status = MemberStatus::TornDown;
        }

        let frame = host.state().frame();
        debug_assert_eq!(frame.map_or(0, GroupFrame::live_finalizers), 0);
        let group_was_set_up = frame.is_some_and(GroupFrame::has_setup);
        if group_was_set_up {
            if let Err(failure) = host.teardown_group(next) {
                debug!(group = %key, %failure, "group teardown failed");
                if let Some(last) = teardowns.last_mut() {
                    let mut failures = Vec::new();
                    if let TestStatus::Failed(own) = &last.status {
                        failures.push(own.clone());
                    }
                    failures.push(failure);
                    if let Some(combined) = TestFailure::combine(failures) {
                        last.status = TestStatus::Failed(combined);
                    }
                }
            }
        }

        for (member, outcome) in group.members.iter().zip(teardowns) {
            self.adapter.report(&member.test.meta, Phase::Teardown, outcome);
        }

        Ok(())
    }
}

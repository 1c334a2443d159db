use std::{borrow::Cow, fmt, mem};

use tracing::{trace, warn};

use crate::{
    fixture::{Finalizer, run_finalizers},
    group::GroupKey,
    outcome::TestFailure,
    test::{SuitePath, TestMeta},
};

/// Something that can be set up and torn down: the session, a suite, a test
/// or a concurrent group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Session,
    Suite(SuitePath),
    Test {
        suite: SuitePath,
        name: Cow<'static, str>,
    },
    Group(GroupKey),
}

impl Node {
    pub fn test<Extra>(meta: &TestMeta<Extra>) -> Self {
        Node::Test {
            suite: meta.suite.clone(),
            name: meta.name.clone(),
        }
    }

    /// The session followed by every suite down to `suite`.
    pub fn suite_chain(suite: &SuitePath) -> Vec<Node> {
        std::iter::once(Node::Session)
            .chain(suite.ancestors().map(Node::Suite))
            .collect()
    }

    pub fn test_chain<Extra>(meta: &TestMeta<Extra>) -> Vec<Node> {
        let mut chain = Self::suite_chain(&meta.suite);
        chain.push(Self::test(meta));
        chain
    }

    pub fn group_chain(anchor: &SuitePath, key: &GroupKey) -> Vec<Node> {
        let mut chain = Self::suite_chain(anchor);
        chain.push(Node::Group(key.clone()));
        chain
    }
}

struct StackEntry {
    node: Node,
    finalizers: Vec<Finalizer>,
}

impl fmt::Debug for StackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackEntry")
            .field("node", &self.node)
            .field("finalizers", &self.finalizers.len())
            .finish()
    }
}

/// How [`SetupState`] handles nodes that are not on its stack.
#[derive(Debug, Default)]
pub enum UnwindStrategy {
    /// Every node is pushed and popped in stack order.
    #[default]
    Exact,

    /// A concurrent group owns the stack, its members keep their finalizers
    /// in the frame and are torn down one by one.
    Group(GroupFrame),
}

/// The group owning a [`SetupState`] while its members run.
///
/// Keeps the finalizers of every entered member until that member is torn
/// down, and whether the group node itself was pushed.
pub struct GroupFrame {
    group: Node,
    has_setup: bool,
    members: Vec<(Node, Vec<Finalizer>)>,
}

impl fmt::Debug for GroupFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupFrame")
            .field("group", &self.group)
            .field("has_setup", &self.has_setup)
            .field("members", &self.members.len())
            .field("live_finalizers", &self.live_finalizers())
            .finish()
    }
}

impl GroupFrame {
    pub fn new(key: GroupKey) -> Self {
        Self {
            group: Node::Group(key),
            has_setup: false,
            members: Vec::new(),
        }
    }

    pub fn has_setup(&self) -> bool {
        self.has_setup
    }

    /// Finalizers registered by members that were not torn down yet.
    pub fn live_finalizers(&self) -> usize {
        self.members.iter().map(|(_, finalizers)| finalizers.len()).sum()
    }

    fn into_finalizers(self) -> Vec<Finalizer> {
        self.members
            .into_iter()
            .flat_map(|(_, finalizers)| finalizers)
            .collect()
    }
}

/// The linear stack of set up nodes and their finalizers.
#[derive(Debug, Default)]
pub struct SetupState {
    stack: Vec<StackEntry>,
    strategy: UnwindStrategy,
}

impl SetupState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stack(&self) -> impl Iterator<Item = &Node> {
        self.stack.iter().map(|entry| &entry.node)
    }

    pub fn frame(&self) -> Option<&GroupFrame> {
        match &self.strategy {
            UnwindStrategy::Group(frame) => Some(frame),
            UnwindStrategy::Exact => None,
        }
    }

    /// Push every node of `chain` that is not on the stack yet.
    ///
    /// The stack has to be a prefix of `chain`.
    pub fn setup(&mut self, chain: &[Node]) {
        debug_assert!(
            self.stack
                .iter()
                .zip(chain)
                .all(|(entry, node)| entry.node == *node),
            "setup stack is not a prefix of the next chain"
        );

        for node in chain.iter().skip(self.stack.len()) {
            trace!(?node, "setting up");
            self.stack.push(StackEntry {
                node: node.clone(),
                finalizers: Vec::new(),
            });
        }

        if let UnwindStrategy::Group(frame) = &mut self.strategy {
            if chain.last() == Some(&frame.group) {
                frame.has_setup = true;
            }
        }
    }

    /// Start a group member, its finalizers are kept apart from the stack.
    ///
    /// Members sharing a node each get their own entry. Finalizers go to the
    /// latest entry, teardown takes the oldest one.
    pub fn enter_member(&mut self, node: Node) {
        match &mut self.strategy {
            UnwindStrategy::Group(frame) => frame.members.push((node, Vec::new())),
            UnwindStrategy::Exact => warn!(?node, "entering a member outside of a group"),
        }
    }

    pub fn add_finalizer(&mut self, node: &Node, finalizer: Finalizer) {
        if let UnwindStrategy::Group(frame) = &mut self.strategy {
            if let Some((_, finalizers)) = frame.members.iter_mut().rev().find(|(member, _)| member == node) {
                finalizers.push(finalizer);
                return;
            }
        }

        if let Some(entry) = self.stack.iter_mut().rev().find(|entry| entry.node == *node) {
            entry.finalizers.push(finalizer);
            return;
        }

        warn!(?node, "node is not set up, keeping its finalizer on the innermost node");
        match self.stack.last_mut() {
            Some(entry) => entry.finalizers.push(finalizer),
            None => self.stack.push(StackEntry {
                node: Node::Session,
                finalizers: vec![finalizer],
            }),
        }
    }

    /// Run the finalizers of a single group member.
    ///
    /// Members that never entered the frame have nothing to tear down.
    pub fn teardown_member(&mut self, node: &Node) -> Result<(), TestFailure> {
        let UnwindStrategy::Group(frame) = &mut self.strategy else {
            return Ok(());
        };
        let Some(index) = frame.members.iter().position(|(member, _)| member == node) else {
            return Ok(());
        };

        let (_, finalizers) = frame.members.remove(index);
        trace!(?node, count = finalizers.len(), "tearing down member");
        run_finalizers(finalizers)
    }

    /// Pop every node that is not part of `next`, innermost first.
    ///
    /// All finalizers run even if some fail, the failures are combined.
    pub fn teardown_exact(&mut self, next: &[Node]) -> Result<(), TestFailure> {
        let keep = self
            .stack
            .iter()
            .zip(next)
            .take_while(|(entry, node)| entry.node == **node)
            .count();

        let mut failures = Vec::new();
        while self.stack.len() > keep {
            let Some(entry) = self.stack.pop() else {
                break;
            };
            trace!(node = ?entry.node, "tearing down");
            if let Err(failure) = run_finalizers(entry.finalizers) {
                failures.push(failure);
            }
        }

        match TestFailure::combine(failures) {
            None => Ok(()),
            Some(failure) => Err(failure),
        }
    }

    /// Install `strategy`, returning the one it replaces.
    pub fn replace_strategy(&mut self, strategy: UnwindStrategy) -> UnwindStrategy {
        mem::replace(&mut self.strategy, strategy)
    }

    /// Run `f` with `strategy` installed, then restore the previous strategy.
    ///
    /// Member finalizers still registered when `f` returns are run.
    pub fn with_unwind_strategy<R>(
        &mut self,
        strategy: UnwindStrategy,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let previous = self.replace_strategy(strategy);
        let result = f(self);
        self.restore_strategy(previous);
        result
    }

    /// Put `previous` back in place, running member finalizers left in the
    /// strategy it replaces.
    pub fn restore_strategy(&mut self, previous: UnwindStrategy) {
        let UnwindStrategy::Group(frame) = self.replace_strategy(previous) else {
            return;
        };
        if frame.live_finalizers() == 0 {
            return;
        }

        warn!(group = ?frame.group, "running finalizers left behind by group members");
        if let Err(failure) = run_finalizers(frame.into_finalizers()) {
            warn!(%failure, "finalizers of group members failed");
        }
    }

    /// Run every finalizer that is still registered, leaving the state empty.
    pub fn drain_all(&mut self) -> Result<(), TestFailure> {
        let mut failures = Vec::new();

        if let UnwindStrategy::Group(frame) = &mut self.strategy {
            let members = mem::take(&mut frame.members);
            for (_, finalizers) in members.into_iter().rev() {
                if let Err(failure) = run_finalizers(finalizers) {
                    failures.push(failure);
                }
            }
        }

        if let Err(failure) = self.teardown_exact(&[]) {
            failures.push(failure);
        }

        match TestFailure::combine(failures) {
            None => Ok(()),
            Some(failure) => Err(failure),
        }
    }
}

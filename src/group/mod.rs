//! Concurrent groups.
//!
//! Tests marked [`ConcurrentMark::Concurrent`](crate::test::ConcurrentMark)
//! with the same group name are collected into one [`Group`]. The run loop
//! sees a group as a single item: its members are set up one after another,
//! their bodies run together on the event loop, and then they are torn down
//! one after another again.

use std::{
    borrow::Cow,
    fmt::{self, Display},
};

use tracing::warn;

use crate::{
    fixture::{FixtureBindings, isolate},
    host::Node,
    test::{SuitePath, Test},
};

mod controller;
pub use controller::*;

mod registry;
pub use registry::*;

mod scheduler;
pub use scheduler::*;

/// Identifies a group, either by the name on the mark or by a generated key
/// for marks without a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Named(Cow<'static, str>),
    Anonymous(u64),
}

impl Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Named(name) => f.write_str(name),
            GroupKey::Anonymous(id) => write!(f, "anonymous-{id}"),
        }
    }
}

impl From<&'static str> for GroupKey {
    fn from(value: &'static str) -> Self {
        Self::Named(value.into())
    }
}

impl From<String> for GroupKey {
    fn from(value: String) -> Self {
        Self::Named(value.into())
    }
}

/// How far a member got through its group's phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemberStatus {
    #[default]
    Unstarted,
    SetupPassed,

    /// Setup failed or was skipped, the member's body is not called.
    SetupFailed,
    Called,
    TornDown,
}

/// A test inside a [`Group`] together with the fixtures it resolves.
#[derive(Debug)]
pub struct Member<'t, Extra> {
    pub test: &'t Test<Extra>,

    /// The member's own bindings, function scoped ones are private copies
    /// once [`Member::isolate`] ran.
    pub bindings: FixtureBindings,
    pub status: MemberStatus,
}

impl<'t, Extra> Member<'t, Extra> {
    pub fn new(test: &'t Test<Extra>, bindings: FixtureBindings) -> Self {
        Self {
            test,
            bindings,
            status: MemberStatus::Unstarted,
        }
    }

    /// Swap function scoped fixtures for private copies, see [`isolate`].
    pub fn isolate(&mut self) -> usize {
        isolate(&self.test.meta, &mut self.bindings)
    }
}

/// Tests sharing a [`GroupKey`], set up one by one and called together.
#[derive(Debug)]
pub struct Group<'t, Extra> {
    pub key: GroupKey,

    /// The suite of the first member, the group sits on the stack below it.
    pub anchor: SuitePath,

    pub members: Vec<Member<'t, Extra>>,

    /// Turns `false` once a member from another suite joins and stays so.
    pub children_have_same_parent: bool,
}

impl<'t, Extra> Group<'t, Extra> {
    pub fn new(key: GroupKey, first: Member<'t, Extra>) -> Self {
        Self {
            key,
            anchor: first.test.suite.clone(),
            members: vec![first],
            children_have_same_parent: true,
        }
    }

    pub fn add_child(&mut self, member: Member<'t, Extra>) {
        if member.test.suite != self.anchor && self.children_have_same_parent {
            warn!(
                group = %self.key,
                anchor = %self.anchor,
                suite = %member.test.suite,
                "group members come from different suites"
            );
            self.children_have_same_parent = false;
        }
        self.members.push(member);
    }

    /// Remove `test` from the members, returns whether it was one.
    pub fn remove(&mut self, test: &Test<Extra>) -> bool {
        let before = self.members.len();
        self.members.retain(|member| !std::ptr::eq(member.test, test));
        self.members.len() != before
    }

    pub fn contains(&self, test: &Test<Extra>) -> bool {
        self.members
            .iter()
            .any(|member| std::ptr::eq(member.test, test))
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// The node the group occupies on the setup stack.
    pub fn node(&self) -> Node {
        Node::Group(self.key.clone())
    }

    /// Session, the anchor's suites and the group node itself.
    pub fn chain(&self) -> Vec<Node> {
        Node::group_chain(&self.anchor, &self.key)
    }
}

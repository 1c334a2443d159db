use std::collections::HashMap;

use tracing::{debug, trace};

use crate::{
    fixture::FixtureRegistry,
    group::{Group, GroupKey, Member},
    host::Node,
    test::{ConcurrentMark, Test},
};

/// Index of a group inside its [`GroupRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(usize);

/// One entry of the run order: a test run on its own or the placeholder of a
/// whole group.
#[derive(Debug)]
pub enum Item<'t, Extra> {
    Test(&'t Test<Extra>),
    Group(GroupId),
}

impl<Extra> Clone for Item<'_, Extra> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Extra> Copy for Item<'_, Extra> {}

/// Collects tests into groups and keeps the run order.
///
/// A group's placeholder takes the position of its first member, later
/// members are pulled out of the run order into the group.
#[derive(Debug)]
pub struct GroupRegistry<'t, Extra> {
    groups: Vec<Option<Group<'t, Extra>>>,
    by_key: HashMap<GroupKey, GroupId>,
    items: Vec<Item<'t, Extra>>,
    next_anonymous: u64,
}

impl<'t, Extra> Default for GroupRegistry<'t, Extra> {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            by_key: HashMap::new(),
            items: Vec::new(),
            next_anonymous: 0,
        }
    }
}

impl<'t, Extra> GroupRegistry<'t, Extra> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the run order for `tests`, grouping every concurrent test.
    pub fn collect(
        tests: impl IntoIterator<Item = &'t Test<Extra>>,
        fixtures: &FixtureRegistry,
    ) -> Self {
        let mut registry = Self::new();
        for test in tests {
            registry.push(test, fixtures);
        }
        debug!(
            items = registry.items.len(),
            groups = registry.by_key.len(),
            "collected tests"
        );
        registry
    }

    /// Append `test` to the run order, or to its group if it is concurrent.
    pub fn push(&mut self, test: &'t Test<Extra>, fixtures: &FixtureRegistry) {
        match test.concurrent.is_concurrent() {
            true => {
                self.register(test, fixtures);
            }
            false => self.items.push(Item::Test(test)),
        }
    }

    fn key_for(&mut self, mark: &ConcurrentMark) -> GroupKey {
        match mark {
            ConcurrentMark::Concurrent {
                group: Some(name), ..
            } => GroupKey::Named(name.clone()),
            _ => {
                let key = GroupKey::Anonymous(self.next_anonymous);
                self.next_anonymous += 1;
                key
            }
        }
    }

    /// Add `test` to the group named by its mark, creating it if needed.
    pub fn register(&mut self, test: &'t Test<Extra>, fixtures: &FixtureRegistry) -> GroupId {
        let key = self.key_for(&test.concurrent);
        let mut member = Member::new(test, fixtures.bindings_for(&test.meta));
        member.isolate();

        if let Some(&id) = self.by_key.get(&key) {
            if let Some(group) = self.groups[id.0].as_mut() {
                trace!(group = %key, test = %test.name, "joining group");
                group.add_child(member);
                return id;
            }
        }

        let id = GroupId(self.groups.len());
        trace!(group = %key, test = %test.name, "creating group");
        self.groups.push(Some(Group::new(key.clone(), member)));
        self.by_key.insert(key, id);
        self.items.push(Item::Group(id));
        id
    }

    /// Remove a member from its group, dropping the group once it is empty.
    ///
    /// Returns whether `test` was a member of any group.
    pub fn deregister(&mut self, test: &Test<Extra>) -> bool {
        let Some(index) = self
            .groups
            .iter()
            .position(|group| group.as_ref().is_some_and(|group| group.contains(test)))
        else {
            return false;
        };

        let Some(group) = self.groups[index].as_mut() else {
            return false;
        };
        group.remove(test);

        if group.is_empty() {
            debug!(group = %group.key, "group has no members left");
            self.by_key.remove(&group.key);
            self.groups[index] = None;
            let id = GroupId(index);
            self.items
                .retain(|item| !matches!(item, Item::Group(group) if *group == id));
        }
        true
    }

    /// Take `test` out of the run, wherever it is.
    pub fn deselect(&mut self, test: &Test<Extra>) {
        if self.deregister(test) {
            return;
        }
        self.items
            .retain(|item| !matches!(item, Item::Test(other) if std::ptr::eq(*other, test)));
    }

    pub fn items(&self) -> &[Item<'t, Extra>] {
        &self.items
    }

    pub fn group(&self, id: GroupId) -> Option<&Group<'t, Extra>> {
        self.groups.get(id.0)?.as_ref()
    }

    /// Hand out a group for running it, it cannot be taken twice.
    pub fn take_group(&mut self, id: GroupId) -> Option<Group<'t, Extra>> {
        let group = self.groups.get_mut(id.0)?.take()?;
        self.by_key.remove(&group.key);
        Some(group)
    }

    /// The node chain `item` is set up in, empty for taken groups.
    pub fn chain(&self, item: &Item<'t, Extra>) -> Vec<Node> {
        match item {
            Item::Test(test) => Node::test_chain(&test.meta),
            Item::Group(id) => self.group(*id).map(Group::chain).unwrap_or_default(),
        }
    }

    /// The number of tests in the run order, group members included.
    pub fn test_count(&self) -> usize {
        self.items
            .iter()
            .map(|item| match item {
                Item::Test(_) => 1,
                Item::Group(id) => self.group(*id).map_or(0, Group::len),
            })
            .sum()
    }
}

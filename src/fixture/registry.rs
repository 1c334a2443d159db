use std::{borrow::Cow, collections::BTreeMap, rc::Rc};

use crate::{
    fixture::{FixtureDef, wrap_async_fixture},
    test::{SuitePath, TestMeta},
};

/// Every fixture definition known to a run.
///
/// Several definitions may share a name. Which one a test gets depends on
/// where the test lives: the definition with the most specific visibility
/// wins, later registrations win over earlier ones.
#[derive(Debug, Default)]
pub struct FixtureRegistry {
    defs: Vec<Rc<FixtureDef>>,
}

impl FixtureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: FixtureDef) {
        self.defs.push(Rc::new(wrap_async_fixture(def)));
    }

    pub fn with(mut self, def: FixtureDef) -> Self {
        self.register(def);
        self
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// All definitions of `name` visible from `suite`, broadest first.
    pub fn chain(&self, name: &str, suite: &SuitePath) -> Vec<Rc<FixtureDef>> {
        let mut chain: Vec<_> = self
            .defs
            .iter()
            .filter(|def| def.name == name && def.is_visible_from(suite))
            .cloned()
            .collect();
        chain.sort_by_key(|def| def.visibility.depth());
        chain
    }

    /// The bindings of every fixture a test needs, including indirect ones.
    pub fn bindings_for<Extra>(&self, meta: &TestMeta<Extra>) -> FixtureBindings {
        let mut bindings = BTreeMap::new();
        let mut pending: Vec<&'static str> = meta.fixtures.iter().rev().copied().collect();

        while let Some(name) = pending.pop() {
            if bindings.contains_key(name) {
                continue;
            }

            let chain = self.chain(name, &meta.suite);
            if let Some(active) = chain.last() {
                pending.extend(active.depends.iter().rev().copied());
            }
            if !chain.is_empty() {
                bindings.insert(Cow::Borrowed(name), chain);
            }
        }

        FixtureBindings(bindings)
    }
}

/// Per test mapping from fixture name to its provider chain.
///
/// The last definition of a chain is the active one.
#[derive(Debug, Default, Clone)]
pub struct FixtureBindings(BTreeMap<Cow<'static, str>, Vec<Rc<FixtureDef>>>);

impl FixtureBindings {
    pub fn active(&self, name: &str) -> Option<&Rc<FixtureDef>> {
        self.0.get(name).and_then(|chain| chain.last())
    }

    pub fn chain(&self, name: &str) -> Option<&[Rc<FixtureDef>]> {
        self.0.get(name).map(Vec::as_slice)
    }

    /// Swap the active definition of `name`, the rest of the chain stays.
    pub fn replace_active(&mut self, name: &str, def: Rc<FixtureDef>) -> Option<Rc<FixtureDef>> {
        let chain = self.0.get_mut(name)?;
        let active = chain.last_mut()?;
        Some(std::mem::replace(active, def))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(AsRef::as_ref)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

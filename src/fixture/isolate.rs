use std::rc::Rc;

use tracing::trace;

use crate::{
    fixture::{FixtureBindings, FixtureScope},
    test::TestMeta,
};

/// Give a test private copies of its function scoped fixtures.
///
/// Parameterised definitions are copied too: a copy caches one instance, so
/// members asking for different parameters never tear down each other's
/// values. Returns the number of copies made.
pub fn isolate<Extra>(meta: &TestMeta<Extra>, bindings: &mut FixtureBindings) -> usize {
    let names: Vec<String> = bindings.names().map(String::from).collect();
    let mut copies = 0;

    for name in names {
        let Some(active) = bindings.active(&name) else {
            continue;
        };
        if active.scope != FixtureScope::Function {
            continue;
        }

        let copy = Rc::new(active.private_copy());
        bindings.replace_active(&name, copy);
        copies += 1;
    }

    trace!(test = %meta.name, copies, "isolated fixtures");
    copies
}

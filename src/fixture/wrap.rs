use std::rc::Rc;

use futures::StreamExt;
use tracing::trace;

use crate::{
    fixture::{
        Finalizer, FixtureDef, FixtureError, FixtureFn, FixtureRequest, ValueFactory,
        YieldFactory,
    },
    outcome::TestFailure,
};

/// Make an async fixture usable from the synchronous setup path.
///
/// Single shot factories block on the shared event loop once. One-yield
/// streams become a setup that takes the first item and a teardown that polls
/// the stream again, which must end it. Sync definitions are returned as is.
pub fn wrap_async_fixture(def: FixtureDef) -> FixtureDef {
    if !def.is_async() {
        return def;
    }

    trace!(fixture = %def.name, "wrapping async fixture");
    let func = synchronize(&def.name, &def.func);
    FixtureDef {
        visibility: def.visibility.clone(),
        depends: def.depends.clone(),
        ..FixtureDef::from_parts(def.name.clone(), def.scope, func)
    }
}

pub(crate) fn synchronize(name: &str, func: &FixtureFn) -> FixtureFn {
    match func {
        FixtureFn::Value(_) | FixtureFn::Yield(_) => func.clone(),
        FixtureFn::AsyncValue(factory) => {
            let factory = Rc::clone(factory);
            let wrapped: ValueFactory = Rc::new(move |request: &FixtureRequest<'_>| {
                request.event_loop.block_on(factory(request))
            });
            FixtureFn::Value(wrapped)
        }
        FixtureFn::AsyncYield(factory) => {
            let factory = Rc::clone(factory);
            let name = name.to_string();
            let wrapped: YieldFactory = Rc::new(move |request: &FixtureRequest<'_>| {
                let event_loop = Rc::clone(request.event_loop);
                let mut stream = factory(request);
                let value = match event_loop.block_on(stream.next()) {
                    Some(item) => item?,
                    None => {
                        return Err(TestFailure::Fixture(FixtureError::AsyncGenEmpty {
                            name: name.clone(),
                        }));
                    }
                };

                let name = name.clone();
                let finalizer: Finalizer = Box::new(move || {
                    match event_loop.block_on(stream.next()) {
                        None => Ok(()),
                        Some(Err(failure)) => Err(failure),
                        Some(Ok(_)) => Err(TestFailure::Fixture(
                            FixtureError::AsyncGenDidNotStop { name },
                        )),
                    }
                });
                Ok((value, finalizer))
            });
            FixtureFn::Yield(wrapped)
        }
    }
}

//! Fixtures: named values a test asks for by name.
//!
//! A [`FixtureDef`] describes how to build a value, how long it lives
//! ([`FixtureScope`]) and which suites may see it. Values are cached on the
//! definition until the node of their scope is torn down, so every test
//! below that node shares one value.
//!
//! Tests running together in a concurrent group are all set up before any of
//! them is torn down. [`isolate`] gives each of them private copies of their
//! function scoped definitions so they never see each other's values.

use std::{
    any::{Any, type_name},
    borrow::Cow,
    cell::{Cell, RefCell},
    collections::BTreeMap,
    error::Error as StdError,
    fmt::{self, Debug},
    future::Future,
    panic::{AssertUnwindSafe, catch_unwind},
    rc::Rc,
};

use futures::{
    FutureExt, Stream, StreamExt,
    future::LocalBoxFuture,
    stream::LocalBoxStream,
};
use thiserror::Error;

use crate::{
    event_loop::EventLoop,
    outcome::TestFailure,
    panic::payload_as_string,
    test::SuitePath,
};

mod isolate;
pub use isolate::*;

mod registry;
pub use registry::*;

mod wrap;
pub use wrap::*;

pub type FixtureValue = Rc<dyn Any>;

/// What fixture factories return, any error type works with `?`.
pub type FixtureResult<T> = Result<T, Box<dyn StdError>>;

/// Cleanup registered during setup, run during teardown.
pub type Finalizer = Box<dyn FnOnce() -> Result<(), TestFailure>>;

pub(crate) type ValueFactory =
    Rc<dyn Fn(&FixtureRequest<'_>) -> Result<FixtureValue, TestFailure>>;
pub(crate) type YieldFactory =
    Rc<dyn Fn(&FixtureRequest<'_>) -> Result<(FixtureValue, Finalizer), TestFailure>>;
pub(crate) type AsyncValueFactory =
    Rc<dyn Fn(&FixtureRequest<'_>) -> LocalBoxFuture<'static, Result<FixtureValue, TestFailure>>>;
pub(crate) type AsyncYieldFactory =
    Rc<dyn Fn(&FixtureRequest<'_>) -> LocalBoxStream<'static, Result<FixtureValue, TestFailure>>>;

/// How long a fixture value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum FixtureScope {
    /// One value per test.
    #[default]
    Function,

    /// One value per innermost suite.
    Suite,

    /// One value per outermost suite.
    Module,

    Session,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum FixtureError {
    #[error("fixture `{name}` not found")]
    NotFound { name: String },

    #[error("recursive dependency involving fixture `{name}`")]
    Recursive { name: String },

    #[error("async generator fixture `{name}` didn't stop, yield only once")]
    AsyncGenDidNotStop { name: String },

    #[error("async generator fixture `{name}` finished without yielding a value")]
    AsyncGenEmpty { name: String },

    #[error("fixture `{name}` does not hold a `{expected}`")]
    WrongType { name: String, expected: &'static str },
}

#[derive(Clone)]
pub(crate) enum FixtureFn {
    Value(ValueFactory),

    /// Builds a value together with its teardown.
    Yield(YieldFactory),

    AsyncValue(AsyncValueFactory),

    /// A stream yielding the value once, polled again for teardown.
    AsyncYield(AsyncYieldFactory),
}

impl FixtureFn {
    pub fn is_async(&self) -> bool {
        matches!(self, FixtureFn::AsyncValue(_) | FixtureFn::AsyncYield(_))
    }
}

impl Debug for FixtureFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureFn::Value(_) => write!(f, "Value(...)"),
            FixtureFn::Yield(_) => write!(f, "Yield(...)"),
            FixtureFn::AsyncValue(_) => write!(f, "AsyncValue(...)"),
            FixtureFn::AsyncYield(_) => write!(f, "AsyncYield(...)"),
        }
    }
}

fn user_failure(err: Box<dyn StdError>) -> TestFailure {
    TestFailure::Error(err.to_string())
}

struct Instance {
    id: u64,
    param: Option<usize>,
    result: Result<FixtureValue, TestFailure>,
    teardown: Option<Finalizer>,
}

/// A fixture definition.
pub struct FixtureDef {
    pub name: Cow<'static, str>,
    pub scope: FixtureScope,

    /// Only tests inside this suite see the fixture, the root makes it global.
    pub visibility: SuitePath,

    /// Fixtures set up before this one, available via [`FixtureRequest::value`].
    pub depends: Cow<'static, [&'static str]>,

    pub(crate) func: FixtureFn,
    instance: RefCell<Option<Instance>>,
    next_id: Cell<u64>,
}

impl Debug for FixtureDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureDef")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("visibility", &self.visibility)
            .field("depends", &self.depends)
            .field("func", &self.func)
            .finish_non_exhaustive()
    }
}

impl FixtureDef {
    pub(crate) fn from_parts(
        name: Cow<'static, str>,
        scope: FixtureScope,
        func: FixtureFn,
    ) -> Self {
        Self {
            name,
            scope,
            visibility: SuitePath::default(),
            depends: Cow::Borrowed(&[]),
            func,
            instance: RefCell::new(None),
            next_id: Cell::new(0),
        }
    }

    pub fn new<F, T>(name: impl Into<Cow<'static, str>>, scope: FixtureScope, f: F) -> Self
    where
        F: Fn(&FixtureRequest<'_>) -> FixtureResult<T> + 'static,
        T: Any,
    {
        let factory: ValueFactory = Rc::new(move |request: &FixtureRequest<'_>| {
            f(request)
                .map(|value| Rc::new(value) as FixtureValue)
                .map_err(user_failure)
        });
        Self::from_parts(name.into(), scope, FixtureFn::Value(factory))
    }

    /// A fixture that returns its value together with a teardown closure.
    pub fn yielding<F, T, G>(name: impl Into<Cow<'static, str>>, scope: FixtureScope, f: F) -> Self
    where
        F: Fn(&FixtureRequest<'_>) -> FixtureResult<(T, G)> + 'static,
        T: Any,
        G: FnOnce() -> FixtureResult<()> + 'static,
    {
        let factory: YieldFactory = Rc::new(move |request: &FixtureRequest<'_>| {
            let (value, teardown) = f(request).map_err(user_failure)?;
            let finalizer: Finalizer = Box::new(move || teardown().map_err(user_failure));
            Ok((Rc::new(value) as FixtureValue, finalizer))
        });
        Self::from_parts(name.into(), scope, FixtureFn::Yield(factory))
    }

    pub fn new_async<F, Fut, T>(name: impl Into<Cow<'static, str>>, scope: FixtureScope, f: F) -> Self
    where
        F: Fn(&FixtureRequest<'_>) -> Fut + 'static,
        Fut: Future<Output = FixtureResult<T>> + 'static,
        T: Any,
    {
        let factory: AsyncValueFactory = Rc::new(move |request: &FixtureRequest<'_>| {
            f(request)
                .map(|result| {
                    result
                        .map(|value| Rc::new(value) as FixtureValue)
                        .map_err(user_failure)
                })
                .boxed_local()
        });
        Self::from_parts(name.into(), scope, FixtureFn::AsyncValue(factory))
    }

    /// An async fixture that yields its value exactly once.
    ///
    /// The stream is polled again during teardown and must end there.
    pub fn async_yielding<F, S, T>(
        name: impl Into<Cow<'static, str>>,
        scope: FixtureScope,
        f: F,
    ) -> Self
    where
        F: Fn(&FixtureRequest<'_>) -> S + 'static,
        S: Stream<Item = FixtureResult<T>> + 'static,
        T: Any,
    {
        let factory: AsyncYieldFactory = Rc::new(move |request: &FixtureRequest<'_>| {
            f(request)
                .map(|item| {
                    item.map(|value| Rc::new(value) as FixtureValue)
                        .map_err(user_failure)
                })
                .boxed_local()
        });
        Self::from_parts(name.into(), scope, FixtureFn::AsyncYield(factory))
    }

    pub fn with_visibility(mut self, suite: impl Into<SuitePath>) -> Self {
        self.visibility = suite.into();
        self
    }

    pub fn with_depends(mut self, depends: &'static [&'static str]) -> Self {
        self.depends = Cow::Borrowed(depends);
        self
    }

    pub fn is_async(&self) -> bool {
        self.func.is_async()
    }

    pub fn is_visible_from(&self, suite: &SuitePath) -> bool {
        suite.starts_with(&self.visibility)
    }

    /// A definition with the same factory but its own cache and teardown.
    pub fn private_copy(&self) -> FixtureDef {
        FixtureDef {
            visibility: self.visibility.clone(),
            depends: self.depends.clone(),
            ..Self::from_parts(self.name.clone(), self.scope, self.func.clone())
        }
    }

    /// Get the value for `request`, computing it unless it is already cached.
    ///
    /// Freshly computed results come with a finalizer that must be registered
    /// on the node of this definition's scope. Failed setups are cached too.
    pub(crate) fn execute(
        self: &Rc<Self>,
        request: &FixtureRequest<'_>,
    ) -> (Result<FixtureValue, TestFailure>, Option<Finalizer>) {
        if let Some(instance) = self.instance.borrow().as_ref() {
            if instance.param == request.param {
                return (instance.result.clone(), None);
            }
        }

        let stale = self.instance.borrow().as_ref().map(|instance| instance.id);
        if let Some(id) = stale {
            if let Err(failure) = self.finish(id) {
                return (Err(failure), None);
            }
        }

        let caught = catch_unwind(AssertUnwindSafe(|| produce(&self.name, &self.func, request)));

        let (result, teardown) = match caught {
            Ok(Ok((value, teardown))) => (Ok(value), teardown),
            Ok(Err(failure)) => (Err(failure), None),
            Err(payload) => (Err(TestFailure::Panicked(payload_as_string(payload))), None),
        };

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        *self.instance.borrow_mut() = Some(Instance {
            id,
            param: request.param,
            result: result.clone(),
            teardown,
        });

        let def = Rc::clone(self);
        let finalizer: Finalizer = Box::new(move || def.finish(id));
        (result, Some(finalizer))
    }

    /// Tear down the cached instance `id`, if it is still the current one.
    fn finish(&self, id: u64) -> Result<(), TestFailure> {
        let instance = {
            let mut current = self.instance.borrow_mut();
            match current.as_ref() {
                Some(instance) if instance.id == id => current.take(),
                _ => None,
            }
        };

        match instance.and_then(|instance| instance.teardown) {
            Some(teardown) => run_finalizers(vec![teardown]),
            None => Ok(()),
        }
    }
}

fn produce(
    name: &str,
    func: &FixtureFn,
    request: &FixtureRequest<'_>,
) -> Result<(FixtureValue, Option<Finalizer>), TestFailure> {
    match func {
        FixtureFn::Value(factory) => factory(request).map(|value| (value, None)),
        FixtureFn::Yield(factory) => {
            factory(request).map(|(value, teardown)| (value, Some(teardown)))
        }
        FixtureFn::AsyncValue(_) | FixtureFn::AsyncYield(_) => {
            produce(name, &wrap::synchronize(name, func), request)
        }
    }
}

/// What a fixture factory knows about the test it builds a value for.
#[derive(Debug)]
pub struct FixtureRequest<'r> {
    pub(crate) fixture: &'r str,
    pub(crate) test: &'r str,
    pub(crate) param: Option<usize>,
    pub(crate) values: &'r BTreeMap<Cow<'static, str>, FixtureValue>,
    pub(crate) event_loop: &'r Rc<EventLoop>,
}

impl<'r> FixtureRequest<'r> {
    pub fn fixture(&self) -> &str {
        self.fixture
    }

    pub fn test(&self) -> &str {
        self.test
    }

    /// The parameter index of the requesting test for this fixture.
    pub fn param(&self) -> Option<usize> {
        self.param
    }

    /// The value of a fixture this one depends on.
    pub fn value<T: Any>(&self, name: &str) -> Result<Rc<T>, FixtureError> {
        downcast_value(self.values, name)
    }

    pub fn event_loop(&self) -> &Rc<EventLoop> {
        self.event_loop
    }
}

/// The resolved fixture values handed to a test body.
#[derive(Debug, Default, Clone)]
pub struct FixtureArgs(pub(crate) BTreeMap<Cow<'static, str>, FixtureValue>);

impl FixtureArgs {
    pub fn get<T: Any>(&self, name: &str) -> Result<Rc<T>, FixtureError> {
        downcast_value(&self.0, name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn downcast_value<T: Any>(
    values: &BTreeMap<Cow<'static, str>, FixtureValue>,
    name: &str,
) -> Result<Rc<T>, FixtureError> {
    let value = values.get(name).ok_or_else(|| FixtureError::NotFound {
        name: name.to_string(),
    })?;
    Rc::clone(value)
        .downcast::<T>()
        .map_err(|_| FixtureError::WrongType {
            name: name.to_string(),
            expected: type_name::<T>(),
        })
}

/// Run finalizers last registered first, every one of them even if some fail.
pub(crate) fn run_finalizers(finalizers: Vec<Finalizer>) -> Result<(), TestFailure> {
    let mut failures = Vec::new();
    for finalizer in finalizers.into_iter().rev() {
        match catch_unwind(AssertUnwindSafe(finalizer)) {
            Ok(Ok(())) => (),
            Ok(Err(failure)) => failures.push(failure),
            Err(payload) => failures.push(TestFailure::Panicked(payload_as_string(payload))),
        }
    }

    match TestFailure::combine(failures) {
        None => Ok(()),
        Some(failure) => Err(failure),
    }
}

//! A test runner that groups tests and runs each group's bodies concurrently.
//!
//! Tests run one after another like in any other harness. Tests carrying a
//! [`ConcurrentMark`](test::ConcurrentMark) are collected into groups instead:
//! every member of a group is set up on its own, all member bodies then run
//! together on a single event loop, and finally every member is torn down on
//! its own again. Fixtures, reports and outcome counts work the same for both.
//!
//! ```no_run
//! use cotest::{harness, test::{ConcurrentMark, Test, TestFnHandle, TestMeta}};
//!
//! let tests: [Test; 1] = [Test::new(
//!     TestFnHandle::from_async(|_| async {}),
//!     TestMeta {
//!         name: "fetch".into(),
//!         concurrent: ConcurrentMark::group("http"),
//!         ..TestMeta::default()
//!     },
//! )];
//!
//! harness(&tests).run().unwrap();
//! ```

pub mod error;
pub mod event_loop;
pub mod fixture;
pub mod group;
pub mod host;
pub mod outcome;
pub mod reporter;
pub mod warning;

mod strategy;
pub use strategy::*;

mod harness;
pub use harness::*;

mod report;
pub use report::*;

mod panic;


pub mod prelude {
    pub use crate::{
        RunReport, TestHarness,
        error::Error,
        fixture::{FixtureArgs, FixtureDef, FixtureRegistry, FixtureResult, FixtureScope},
        harness::harness,
        test::{ConcurrentMark, SuitePath, Test, TestFnHandle, TestMeta, TestResult},
    };
}

use std::io;

use thiserror::Error;

/// Errors that end a run early.
///
/// Everything that only affects a single test is reported as a
/// [`TestStatus`](crate::outcome::TestStatus) instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("could not start the event loop")]
    EventLoop(#[source] io::Error),

    #[error("test `{test}` aborted the run: {reason}")]
    Aborted { test: String, reason: String },

    #[error("run interrupted")]
    Interrupted,
}

use std::borrow::Cow;

use thiserror::Error;

use crate::group::GroupKey;

/// Warnings emitted while running, they never fail a run on their own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TestWarning {
    #[error("concurrent group [{group}] has members from different suites, skipping all of them")]
    GroupingConflict { group: GroupKey },

    #[error("`{test}` is marked concurrent but is not async, skipping it")]
    InvalidMark { test: Cow<'static, str> },
}

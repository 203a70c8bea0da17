//! Paging compiler: clamps limit and offset into the configured bounds.

use crate::query::tokens::PagingToken;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_RECORD_LIMIT: i64 = 25;
pub const DEFAULT_MAX_RECORD_LIMIT: i64 = 5000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingLimits {
    pub min_record_limit: i64,
    pub max_record_limit: i64,
}

impl Default for PagingLimits {
    fn default() -> Self {
        PagingLimits {
            min_record_limit: DEFAULT_MIN_RECORD_LIMIT,
            max_record_limit: DEFAULT_MAX_RECORD_LIMIT,
        }
    }
}

/// A missing limit behaves like zero and falls back to the minimum.
pub fn compile_paging(limit: Option<i64>, offset: Option<i64>, limits: &PagingLimits) -> PagingToken {
    let limit = match limit.unwrap_or(0) {
        n if n <= 0 => limits.min_record_limit,
        n if n > limits.max_record_limit => limits.max_record_limit,
        n => n,
    };
    PagingToken {
        limit,
        offset: offset.unwrap_or(0).max(0),
    }
}

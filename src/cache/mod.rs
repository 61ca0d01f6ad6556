//! Memoization stores and cache invalidation
//!
//! Results are memoized with reference-identity semantics: a repeated call
//! with identical arguments returns the exact same `Arc`, not merely an
//! equal value. Invalidation is explicit — each facade registers its memo
//! stores in a [`CacheSet`] at construction time, and `clear_all_caches`
//! sweeps that enumerated set. There is no selective per-entry invalidation.

mod memo;

pub use memo::{CacheSet, Invalidate, MemoCell, MemoMap};

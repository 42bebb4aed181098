//! Durable stores for domainclaw.
//!
//! Two financially-relevant files live under the per-user state directory:
//! the append-only operation ledger and the confirmation-token document.
//! Both are cross-process shared; every read that feeds a write holds an
//! exclusive OS advisory lock for the full read-mutate-write cycle. The
//! update-check cache rides along as a third, best-effort file.

pub mod ledger;
pub mod lock;
pub mod tokens;
pub mod update_cache;

pub use ledger::{Ledger, Operation, OperationKind, OperationStatus};
pub use lock::with_locked_file;
pub use tokens::{ConfirmToken, TokenFile, TokenStore};
pub use update_cache::{UpdateCache, UpdateCacheFile, should_check};

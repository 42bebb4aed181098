//! Policy enforcement for financial mutations.
//!
//! Three gates stand between an intent and a provider call: the budget
//! checks (per-operation price cap plus daily spend/count caps), the
//! auto-purchase acknowledgment gate, and the confirmation-token engine
//! that turns a quoted price into a single-use, TTL-bounded token.

pub mod budget;
pub mod confirm;
pub mod safety;

pub use budget::{check_daily_caps, check_price, daily_totals};
pub use confirm::{TOKEN_TTL, TokenEngine};
pub use safety::{ACK_PHRASE, enable_auto_purchase, hash_acknowledgment, require_auto_enabled};

use std::fmt::Write as _;

/// Lowercase hex of a byte slice (token ids, operation keys, ack hashes).
pub(crate) fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

//! Auto-purchase acknowledgment gate.
//!
//! Unattended purchasing requires the operator to have typed the exact
//! acknowledgment phrase once; only its hash is stored. The gate checks
//! both the enabled flag and the stored hash, so a hand-edited config with
//! `auto_purchase_enabled: true` but no accepted phrase stays locked.

use sha2::{Digest, Sha256};

use domainclaw_core::error::{AppError, Result};

use crate::hex;

/// The exact phrase an operator must supply to enable auto-purchase.
pub const ACK_PHRASE: &str = "I UNDERSTAND PURCHASES ARE FINAL";

/// SHA-256 hex of an acknowledgment phrase.
pub fn hash_acknowledgment(input: &str) -> String {
    hex(&Sha256::digest(input.as_bytes()))
}

/// Accept the acknowledgment phrase, returning the hash to store. Any other
/// phrase is a safety error carrying the required literal in details.
pub fn enable_auto_purchase(ack: &str) -> Result<String> {
    if ack != ACK_PHRASE {
        return Err(AppError::safety("invalid acknowledgment phrase")
            .with_detail("required", ACK_PHRASE));
    }
    Ok(hash_acknowledgment(ack))
}

/// Gate for the unattended purchase path.
pub fn require_auto_enabled(auto_enabled: bool, ack_hash: &str) -> Result<()> {
    if !auto_enabled || ack_hash.is_empty() {
        return Err(AppError::safety("auto-purchase is not enabled"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use domainclaw_core::ErrorKind;

    #[test]
    fn exact_phrase_is_accepted_and_hashed() {
        let hash = enable_auto_purchase(ACK_PHRASE).unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_acknowledgment(ACK_PHRASE));
    }

    #[test]
    fn near_miss_phrases_are_rejected() {
        for phrase in [
            "i understand purchases are final",
            "I UNDERSTAND PURCHASES ARE FINAL ",
            "I UNDERSTAND",
            "",
        ] {
            let err = enable_auto_purchase(phrase).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Safety, "accepted: {phrase:?}");
            assert_eq!(err.details["required"], ACK_PHRASE);
        }
    }

    #[test]
    fn gate_requires_flag_and_hash() {
        assert!(require_auto_enabled(true, "deadbeef").is_ok());

        let err = require_auto_enabled(true, "").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Safety);
        assert_eq!(err.exit_code(), 8);

        assert!(require_auto_enabled(false, "deadbeef").is_err());
        assert!(require_auto_enabled(false, "").is_err());
    }
}

//! # domainclaw Core
//!
//! Domain types, capability traits, and error definitions for the domainclaw
//! registrar CLI. This crate defines the model that all other crates
//! implement against: the error taxonomy with its exit-code contract, the
//! envelope output layer, and the registrar capability surface.
//!
//! ## Design Philosophy
//!
//! The registrar is defined as a pair of traits here (baseline plus optional
//! customer-scoped capability). Implementations live in their own crates.
//! This enables:
//! - Scripted test doubles for the full purchase/renew pipeline
//! - Swapping the HTTP client without touching workflow code
//! - Clean dependency graph (all crates depend inward on core)

pub mod envelope;
pub mod error;
pub mod registrar;

// Re-export key types at crate root for ergonomics
pub use envelope::{Envelope, EnvelopeWriter};
pub use error::{AppError, ErrorKind, Result};
pub use registrar::{
    Availability, CustomerRegistrar, NormalizedPrice, PurchaseOutcome, Registrar, RenewOutcome,
    normalize_price,
};

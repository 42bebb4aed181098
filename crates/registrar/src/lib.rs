//! HTTP client for the registrar API.
//!
//! The client implements the capability traits from `domainclaw-core`:
//! the baseline v1 surface plus the optional customer-scoped v2 surface.
//! Construction enforces the host allow-list; every response flows through
//! a size-bounded reader.

pub mod allowlist;
pub mod client;
pub mod release;

pub use allowlist::validate_base_url;
pub use client::RegistrarClient;
pub use release::{ReleaseInfo, fetch_latest_release};

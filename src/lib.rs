//! contractwatch
//!
//! Derives API contracts and mock-server stubs from recorded HTTP traffic,
//! then keeps them honest by testing the real provider against the contract
//! and checking that deployed mocks still cover it.
//!
//! - **Traffic**: parse HAR-style logs into classified interactions, group them by endpoint
//! - **Analysis**: value patterns, sensitive data, generalization of recorded values
//! - **Contracts**: schema inference and OpenAPI 3.0 synthesis
//! - **Mocks**: WireMock-compatible stubs with templating and stateful scenarios
//! - **Validation**: provider test runs, mock alignment, a weighted health score
//!
//! # Quick Start
//!
//! ```ignore
//! use contractwatch::orchestrator::{synthesize_from_traffic, SynthesisSettings};
//!
//! let har = std::fs::read_to_string("traffic.har")?;
//! let output = synthesize_from_traffic(&har, &SynthesisSettings::default())?;
//! println!("{}", output.contract.to_json_pretty()?);
//! ```

pub mod errors;

// ─── Traffic & analysis (pure) ─────────────────────────────────────
pub mod analysis;
pub mod inference;
pub mod traffic;

// ─── Artifacts ─────────────────────────────────────────────────────
pub mod openapi;
pub mod stubs;

// ─── Network collaborators ─────────────────────────────────────────
pub mod gateway;
pub mod runner;

// ─── Validation ────────────────────────────────────────────────────
pub mod alignment;
pub mod health;
pub mod orchestrator;

// ─── Ambient ───────────────────────────────────────────────────────
pub mod cli;
pub mod config;
pub mod observability;
pub mod testing;

pub use config::Config;
pub use errors::{ContractWatchError, Result};

//! Test support
//!
//! In-process HTTP doubles for exercising the gateway and the contract test
//! runner without live endpoints.

pub mod fake_http;

pub use fake_http::{FakeHttpServer, FakeResponse, ReceivedRequest};

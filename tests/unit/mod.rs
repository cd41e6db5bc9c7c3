//! Integration-level unit tests for contractwatch
//!
//! Pure pipeline stages run against the bundled traffic fixture; network
//! collaborators run against in-process fake HTTP servers.

mod helpers;
mod test_alignment_health;
mod test_gateway;
mod test_openapi;
mod test_orchestrator;
mod test_runner;
mod test_traffic;

//! # Neuron Testkit
//!
//! Testing utilities for the Neuron document vault.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a manual clock, an in-memory store on that clock, and
//!   in-memory sessions served from it
//! - **Generators**: Proptest strategies for requests, keys and payloads
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use neuron_testkit::fixtures::TestFixture;
//!
//! async fn example() {
//!     let fixture = TestFixture::new();
//!     let (mut client, _server) = fixture.open_session().await;
//!     let doc = client.add("alice", "hello", "notes").await.unwrap();
//!     assert!(doc.id.starts_with("notes"));
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use neuron_testkit::generators::invalid_request;
//!
//! proptest! {
//!     #[test]
//!     fn short_fields_rejected(request in invalid_request()) {
//!         prop_assert!(neuron_core::validate_request(&request).is_err());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{ManualClock, ServerHandle, TestFixture, START_MICROS};

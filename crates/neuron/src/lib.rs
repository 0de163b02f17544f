//! # Neuron
//!
//! An end-to-end encrypted document vault. Clients open a session, agree on
//! a per-session key with an X25519 handshake, and exchange sealed Add / Get
//! / List requests. A background sweeper deletes documents once they pass a
//! configured age.
//!
//! ## Components
//!
//! - [`NeuronService`] - routes each connection to ping, echo or a session
//! - [`Server`] - TCP accept loop with graceful drain
//! - [`NeuronClient`] - opens calls against a server
//! - [`retention`] - the sweeper ([`spawn_sweeper`], [`SweeperCompletion`])
//! - [`Config`] - command line and environment configuration
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use neuron::{NeuronClient, NeuronService, Server};
//! use neuron_session::shutdown_channel;
//! use neuron_store::SqliteStore;
//!
//! async fn example() {
//!     let store = Arc::new(SqliteStore::open("neuron.db").unwrap());
//!     let server = Server::bind("127.0.0.1:5005", NeuronService::new(store))
//!         .await
//!         .unwrap();
//!     let (_stop, signal) = shutdown_channel();
//!     tokio::spawn(server.run(signal));
//!
//!     let client = NeuronClient::connect("127.0.0.1:5005").await.unwrap();
//!     let mut session = client.open_session().await.unwrap();
//!     let doc = session.add("alice", "hello", "notes").await.unwrap();
//!     assert_eq!(session.get(&doc.id).await.unwrap(), doc);
//! }
//! ```
//!
//! ## Shutdown Order
//!
//! The sweeper is cancelled first and waited on with a timeout; a timeout
//! there is fatal. The server then stops accepting and drains live
//! connections.

pub mod client;
pub mod config;
pub mod error;
pub mod retention;
pub mod server;
pub mod service;
pub mod telemetry;

pub use client::{NeuronClient, TcpSession};
pub use config::Config;
pub use error::{Result, RetentionError, ServiceError};
pub use retention::{spawn_sweeper, sweep_once, RetentionConfig, SweepReport, SweeperCompletion};
pub use server::Server;
pub use service::NeuronService;

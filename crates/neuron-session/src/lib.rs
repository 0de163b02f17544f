//! # Neuron Session
//!
//! The encrypted session protocol between a Neuron client and server, and
//! the dispatcher that turns decrypted requests into store operations.
//!
//! ## Layers
//!
//! - [`frame`] - length-prefixed CBOR frames on a byte stream
//! - [`transport`] - the [`MessageStream`] trait, over TCP-style byte streams
//!   or in-process channels
//! - [`session`] - handshake and envelope exchange ([`ServerSession`],
//!   [`ClientSession`])
//! - [`dispatcher`] - typed Add / Get / List handling ([`Dispatcher`])
//!
//! ## Message Flow
//!
//! ```text
//! Client                              Server
//!   |-------- Open(session) ---------->|
//!   |-------- client public key ------>|
//!   |<------- server public key -------|
//!   |-------- envelope(Request) ------>|
//!   |<------- envelope(Response) ------|
//!   |              ...                 |
//!   |-------- End -------------------->|
//!   |<------- End ---------------------|
//! ```
//!
//! ## Failure Scope
//!
//! Validation and not-found failures come back as `Response::Error` and the
//! session continues. Handshake failures, undecryptable envelopes, unknown
//! or malformed requests and transport errors end the stream with an
//! `Abort` carrying the mapped status.

pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod session;
pub mod signal;
pub mod transport;

pub use dispatcher::{Dispatcher, MAX_LIST_BYTES};
pub use error::{log_status, Result, SessionError, TransportError};
pub use frame::{read_frame, write_frame, Frame, Method, MAX_FRAME_LEN};
pub use session::{ClientSession, ServerSession, SessionState};
pub use signal::{cancelled, is_cancelled, shutdown_channel};
pub use transport::{memory::pair, memory::MemoryStream, FramedStream, MessageStream};

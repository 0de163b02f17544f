//! Error types for the service frontier.

use std::time::Duration;

use thiserror::Error;

use neuron_session::{SessionError, TransportError};
use neuron_store::StoreError;

/// Errors from serving or calling the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Session failure.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Framing failure before a session began.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Connection opened without a valid call.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Address resolved to nothing.
    #[error("cannot resolve address: {0}")]
    Resolve(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors from the retention sweeper's lifecycle.
#[derive(Debug, Error)]
pub enum RetentionError {
    /// The sweeper did not stop within the allotted time.
    #[error("retention sweeper did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    /// The sweeper task ended without reporting.
    #[error("retention sweeper exited without reporting")]
    Lost,
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

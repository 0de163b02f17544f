//! Server configuration from command-line flags and `NEURON_*` environment
//! variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::ServiceError;
use crate::retention::RetentionConfig;

/// File name of the document database inside the data directory.
pub const DATABASE_FILE: &str = "neuron.db";

/// Neuron document vault server
#[derive(Parser, Clone, Debug)]
#[command(name = "neuron", version, about = "Neuron encrypted document vault")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "NEURON_LISTEN", default_value = "0.0.0.0:5005")]
    pub listen: SocketAddr,

    /// Data directory for the document database
    #[arg(long, env = "NEURON_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Documents older than this many seconds are deleted
    #[arg(long, env = "NEURON_MAX_DOCUMENT_AGE_SECS", default_value_t = 1800)]
    pub max_document_age_secs: u64,

    /// Seconds between retention sweeps
    #[arg(long, env = "NEURON_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,

    /// Seconds to wait for the sweeper and live connections on shutdown
    #[arg(long, env = "NEURON_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// Enable structured JSON logging
    #[arg(long, env = "NEURON_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.max_document_age_secs == 0 {
            return Err(ServiceError::Config(
                "max document age must be at least one second".into(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ServiceError::Config(
                "sweep interval must be at least one second".into(),
            ));
        }
        if self.shutdown_timeout_secs == 0 {
            return Err(ServiceError::Config(
                "shutdown timeout must be at least one second".into(),
            ));
        }
        Ok(())
    }

    /// Path of the SQLite database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// Sweeper settings.
    pub fn retention(&self) -> RetentionConfig {
        RetentionConfig {
            max_age: Duration::from_secs(self.max_document_age_secs),
            interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }

    /// Bound on each shutdown phase.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

//! Compute configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeConfig {
    /// Records per chunk when a backend is wrapped into a chunked iterable
    /// without an explicit chunk size.
    pub chunksize: usize,

    /// Records per batch when element-wise stages run over a plain
    /// (unchunked) stream.
    pub batch_size: usize,

    /// Upper bound on chunks pulled and handed to the executor at once. The
    /// effective width is also capped by the executor's parallelism.
    pub max_in_flight_chunks: usize,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            chunksize: 1024,
            batch_size: 4096,
            max_in_flight_chunks: 4,
        }
    }
}

impl ComputeConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `CHUNKWISE_CHUNKSIZE`: records per chunk
    /// - `CHUNKWISE_BATCH_SIZE`: records per batch on plain streams
    /// - `CHUNKWISE_MAX_IN_FLIGHT_CHUNKS`: chunks handed to the executor at once
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("CHUNKWISE_CHUNKSIZE") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.chunksize = v;
            }
        }

        if let Ok(s) = std::env::var("CHUNKWISE_BATCH_SIZE") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.batch_size = v;
            }
        }

        if let Ok(s) = std::env::var("CHUNKWISE_MAX_IN_FLIGHT_CHUNKS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_in_flight_chunks = v;
            }
        }

        cfg
    }

    pub fn with_chunksize(mut self, chunksize: usize) -> Self {
        self.chunksize = chunksize;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_in_flight_chunks(mut self, n: usize) -> Self {
        self.max_in_flight_chunks = n;
        self
    }

    /// Reject settings that would stall the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.chunksize == 0 {
            return Err(Error::Config("chunksize must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if self.max_in_flight_chunks == 0 {
            return Err(Error::Config(
                "max_in_flight_chunks must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(ComputeConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_chunksize_is_rejected() {
        let cfg = ComputeConfig::default().with_chunksize(0);
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn env_overrides_defaults_and_skips_unparsable_values() {
        std::env::set_var("CHUNKWISE_CHUNKSIZE", "16");
        std::env::set_var("CHUNKWISE_BATCH_SIZE", "lots");
        let cfg = ComputeConfig::from_env();
        std::env::remove_var("CHUNKWISE_CHUNKSIZE");
        std::env::remove_var("CHUNKWISE_BATCH_SIZE");

        assert_eq!(cfg.chunksize, 16);
        assert_eq!(cfg.batch_size, ComputeConfig::default().batch_size);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserializes_from_json() {
        let cfg: ComputeConfig = serde_json::from_str(
            r#"{"chunksize": 2, "batch_size": 8, "max_in_flight_chunks": 1}"#,
        )
        .expect("config json");
        assert_eq!(cfg.chunksize, 2);
        assert_eq!(cfg.max_in_flight_chunks, 1);
    }
}

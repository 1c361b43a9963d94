//! Streamer configuration.

use serde::{Deserialize, Serialize};

use crate::error::StreamerError;

/// Configuration for a [`BlockAndLogStreamer`](crate::BlockAndLogStreamer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamerConfig {
    /// How many recent blocks (and their logs) the checkpoint keeps.
    /// Reorgs deeper than this cannot be joined and reset the history.
    pub block_retention: usize,
}

impl StreamerConfig {
    pub const DEFAULT_BLOCK_RETENTION: usize = 100;

    /// Parse a JSON config, e.g. `{"blockRetention": 50}`. Missing fields take
    /// their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, StreamerError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| StreamerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StreamerError> {
        if self.block_retention == 0 {
            return Err(StreamerError::Config(
                "block retention must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            block_retention: Self::DEFAULT_BLOCK_RETENTION,
        }
    }
}

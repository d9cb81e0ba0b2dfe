use render_link_protocol::{Limits, DEFAULT_MAX_COMMANDS_PER_BATCH, DEFAULT_MAX_MESSAGE_BYTES};
use thiserror::Error;

const ENV_MAX_COMMANDS_PER_BATCH: &str = "RENDER_LINK_MAX_COMMANDS_PER_BATCH";
const ENV_MAX_MESSAGE_BYTES: &str = "RENDER_LINK_MAX_MESSAGE_BYTES";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Largest batch `send`/`execute` will hand to the transport.
    pub max_commands_per_batch: usize,
    /// Largest text frame accepted in either direction.
    pub max_message_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_commands_per_batch: DEFAULT_MAX_COMMANDS_PER_BATCH,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for env var {0}")]
    InvalidEnv(&'static str),
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            max_commands_per_batch: parse_positive(&lookup, ENV_MAX_COMMANDS_PER_BATCH)?
                .unwrap_or(defaults.max_commands_per_batch),
            max_message_bytes: parse_positive(&lookup, ENV_MAX_MESSAGE_BYTES)?
                .unwrap_or(defaults.max_message_bytes),
        })
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_message_bytes: self.max_message_bytes,
            max_commands_per_batch: self.max_commands_per_batch,
        }
    }
}

fn parse_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<usize>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    match raw.trim().parse::<usize>() {
        Ok(0) | Err(_) => Err(ConfigError::InvalidEnv(var)),
        Ok(value) => Ok(Some(value)),
    }
}

use crate::domain::card_range::ProtocolVersion;
use crate::error::{Result, ThreeDsError};
use std::time::Duration;

/// Protocol and timing settings shared by every role.
#[derive(Clone, Debug, clap::Args)]
pub struct ThreeDsConfig {
    /// Protocol version stamped on outgoing messages
    #[arg(long, env = "THREEDS_MESSAGE_VERSION", default_value = "2.2.0")]
    pub message_version: ProtocolVersion,

    /// Lowest protocol version the directory supports
    #[arg(long, env = "THREEDS_DS_START_VERSION", default_value = "2.1.0")]
    pub ds_start_protocol_version: ProtocolVersion,

    /// Highest protocol version the directory supports
    #[arg(long, env = "THREEDS_DS_END_VERSION", default_value = "2.2.0")]
    pub ds_end_protocol_version: ProtocolVersion,

    /// Challenge rounds an app-channel session allows before timing out
    #[arg(long, env = "THREEDS_MAX_CHALLENGE_ROUNDS", default_value = "10")]
    pub max_challenge_rounds: u32,

    /// Seconds a challenge session may stay open
    #[arg(long, env = "THREEDS_CHALLENGE_TIMEOUT_SECS", default_value = "600")]
    pub challenge_timeout_secs: u64,

    /// Seconds the originator waits for challenge results before giving up
    #[arg(long, env = "THREEDS_RESULTS_TIMEOUT_SECS", default_value = "660")]
    pub results_timeout_secs: u64,

    /// Attempts the directory makes when an issuer service is unreachable
    #[arg(long, env = "THREEDS_ROUTE_ATTEMPTS", default_value = "3")]
    pub route_attempts: u32,

    /// Delay between routing attempts, in milliseconds
    #[arg(long, env = "THREEDS_ROUTE_BACKOFF_MS", default_value = "50")]
    pub route_backoff_ms: u64,
}

impl Default for ThreeDsConfig {
    fn default() -> Self {
        Self {
            message_version: ProtocolVersion::new(2, 2, 0),
            ds_start_protocol_version: ProtocolVersion::new(2, 1, 0),
            ds_end_protocol_version: ProtocolVersion::new(2, 2, 0),
            max_challenge_rounds: 10,
            challenge_timeout_secs: 600,
            results_timeout_secs: 660,
            route_attempts: 3,
            route_backoff_ms: 50,
        }
    }
}

impl ThreeDsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_challenge_rounds == 0 {
            return Err(ThreeDsError::Validation(
                "max challenge rounds must be at least 1".to_string(),
            ));
        }
        if self.route_attempts == 0 {
            return Err(ThreeDsError::Validation(
                "route attempts must be at least 1".to_string(),
            ));
        }
        if self.ds_start_protocol_version > self.ds_end_protocol_version {
            return Err(ThreeDsError::Validation(
                "DS start protocol version is above end version".to_string(),
            ));
        }
        if self.results_timeout_secs <= self.challenge_timeout_secs {
            return Err(ThreeDsError::Validation(
                "results timeout must exceed the challenge timeout".to_string(),
            ));
        }
        if self.message_version < self.ds_start_protocol_version
            || self.message_version > self.ds_end_protocol_version
        {
            tracing::warn!(
                version = %self.message_version,
                "message version is outside the directory's supported interval"
            );
        }
        Ok(())
    }

    pub fn challenge_timeout(&self) -> Duration {
        Duration::from_secs(self.challenge_timeout_secs)
    }

    pub fn results_timeout(&self) -> Duration {
        Duration::from_secs(self.results_timeout_secs)
    }

    pub fn route_backoff(&self) -> Duration {
        Duration::from_millis(self.route_backoff_ms)
    }
}

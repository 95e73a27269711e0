//! Configuration types.

use std::net::SocketAddr;

use chrono::TimeDelta;

use crate::error::{ConfigError, Result};
use crate::intake::routes::SessionLimits;
use crate::intake::signature::SignatureStyle;

/// Default port for the demo HTTP host.
const DEFAULT_PORT: u16 = 8080;

/// Patient shown on the provider review screen until a real roster exists.
const DEFAULT_PROVIDER_PATIENT: &str = "Sarah Jones";

/// Demo host configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind: String,
    pub port: u16,
    /// Patient name shown on the provider review screen.
    pub provider_patient: String,
    /// Pen used on the consent signature surface.
    pub signature_style: SignatureStyle,
    /// Bounds on the in-memory intake sessions.
    pub session_limits: SessionLimits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            provider_patient: DEFAULT_PROVIDER_PATIENT.to_string(),
            signature_style: SignatureStyle::default(),
            session_limits: SessionLimits::default(),
        }
    }
}

impl ServerConfig {
    /// Build config from environment variables, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind = std::env::var("CARETAKER_BIND").unwrap_or(defaults.bind);

        let port: u16 = std::env::var("CARETAKER_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let provider_patient = std::env::var("CARETAKER_PROVIDER_PATIENT")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.provider_patient);

        let stroke_width = std::env::var("CARETAKER_SIGNATURE_STROKE_WIDTH")
            .ok()
            .and_then(|s| s.parse::<f32>().ok())
            .filter(|w| w.is_finite() && *w > 0.0)
            .unwrap_or(defaults.signature_style.stroke_width);

        let max_sessions = std::env::var("CARETAKER_MAX_SESSIONS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.session_limits.max_sessions);

        let idle_timeout = std::env::var("CARETAKER_SESSION_IDLE_SECS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|secs| *secs > 0)
            .map(TimeDelta::seconds)
            .unwrap_or(defaults.session_limits.idle_timeout);

        Self {
            bind,
            port,
            provider_patient,
            signature_style: SignatureStyle {
                stroke_width,
                ..defaults.signature_style
            },
            session_limits: SessionLimits {
                max_sessions,
                idle_timeout,
            },
        }
    }

    /// Socket address to listen on.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                key: "CARETAKER_BIND".to_string(),
                message: e.to_string(),
            })?;
        Ok(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.provider_patient, "Sarah Jones");
        assert_eq!(config.signature_style.stroke_width, 2.5);
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
        assert_eq!(config.session_limits.max_sessions, 1000);
        assert_eq!(config.session_limits.idle_timeout, TimeDelta::minutes(30));
    }

    #[test]
    fn bad_bind_is_a_config_error() {
        let config = ServerConfig {
            bind: "not an address".to_string(),
            ..Default::default()
        };
        let err = config.socket_addr().unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidValue { .. })));
        assert!(err.to_string().contains("CARETAKER_BIND"));
    }
}

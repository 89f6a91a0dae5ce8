//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, thresholds within the window)
//! - Check the endpoint is a WebSocket URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::{ClientConfig, HealthProbeConfig, PrimaryConfig};

/// A single violated configuration rule.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("endpoint '{endpoint}' is invalid: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("{section}.window_size must be greater than 0")]
    EmptyWindow { section: &'static str },

    #[error("{section}.{field} must be between 1 and window_size ({window_size}), got {value}")]
    ThresholdOutOfRange {
        section: &'static str,
        field: &'static str,
        value: usize,
        window_size: usize,
    },

    #[error("{section}.{field} must be greater than 0")]
    ZeroDuration {
        section: &'static str,
        field: &'static str,
    },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.endpoint) {
        Ok(url) if matches!(url.scheme(), "ws" | "wss") => {}
        Ok(url) => errors.push(ValidationError::InvalidEndpoint {
            endpoint: config.endpoint.clone(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => errors.push(ValidationError::InvalidEndpoint {
            endpoint: config.endpoint.clone(),
            reason: e.to_string(),
        }),
    }

    if let Err(mut section_errors) = validate_sections(&config.primary, &config.health_probe) {
        errors.append(&mut section_errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate window and timing settings of the primary and the health probe.
pub fn validate_sections(primary: &PrimaryConfig, probe: &HealthProbeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_window(&mut errors, "primary", "min_bad_count", primary.window_size, primary.min_bad_count);
    check_positive(&mut errors, "primary", "probe_interval_secs", primary.probe_interval_secs);
    check_positive(&mut errors, "primary", "probe_timeout_ms", primary.probe_timeout_ms);
    check_positive(&mut errors, "primary", "connection_timeout_secs", primary.connection_timeout_secs);
    check_positive(&mut errors, "primary", "close_timeout_ms", primary.close_timeout_ms);

    check_window(&mut errors, "health_probe", "min_good_count", probe.window_size, probe.min_good_count);
    check_positive(&mut errors, "health_probe", "connection_timeout_secs", probe.connection_timeout_secs);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_window(
    errors: &mut Vec<ValidationError>,
    section: &'static str,
    field: &'static str,
    window_size: usize,
    threshold: usize,
) {
    if window_size == 0 {
        errors.push(ValidationError::EmptyWindow { section });
        return;
    }
    if threshold == 0 || threshold > window_size {
        errors.push(ValidationError::ThresholdOutOfRange {
            section,
            field,
            value: threshold,
            window_size,
        });
    }
}

fn check_positive(errors: &mut Vec<ValidationError>, section: &'static str, field: &'static str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::ZeroDuration { section, field });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ClientConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ClientConfig::default();
        config.endpoint = "http://example.test".to_string();
        config.primary.min_bad_count = 11;
        config.primary.probe_timeout_ms = 0;
        config.health_probe.window_size = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::EmptyWindow { section: "health_probe" }));
        assert!(errors.contains(&ValidationError::ZeroDuration {
            section: "primary",
            field: "probe_timeout_ms",
        }));
    }

    #[test]
    fn test_rejects_unparseable_endpoint() {
        let mut config = ClientConfig::default();
        config.endpoint = "not a url".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_sections_reject_zero_probe_interval() {
        let mut config = ClientConfig::default();
        config.primary.probe_interval_secs = 0;
        let errors = validate_sections(&config.primary, &config.health_probe).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::ZeroDuration {
                section: "primary",
                field: "probe_interval_secs",
            }]
        );
    }

    #[test]
    fn test_accepts_secure_websocket_endpoint() {
        let mut config = ClientConfig::default();
        config.endpoint = "wss://echo.websocket.events/".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_threshold_equal_to_window_is_allowed() {
        let mut config = ClientConfig::default();
        config.primary.min_bad_count = config.primary.window_size;
        assert!(validate_config(&config).is_ok());
    }
}

//! Configuration validation engine.
//!
//! ## Responsibility
//! Validate semantic constraints on a parsed [`LiveConfig`] that cannot
//! be expressed through the type system alone (zero cadences, timing
//! relationships, endpoint shape).
//!
//! ## Guarantees
//! - Every validation rule has at least one test that triggers it
//! - Validation collects *all* errors before returning (no short-circuit)
//! - Error messages include the field path and the invalid value

use super::LiveConfig;

/// Errors arising from configuration parsing, validation, or I/O.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("Parse error in {file}: {source}")]
    Parse {
        /// Path of the file that failed to parse.
        file: String,
        /// Underlying TOML deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// One or more semantic validation rules failed.
    #[error("Invalid configuration in {file}: {}", summarize(.violations))]
    Validation {
        /// Document the configuration came from.
        file: String,
        /// Every rule the configuration broke, in check order.
        violations: Vec<ConfigError>,
    },

    /// A specific field has an out-of-range or contradictory value.
    #[error("Field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        /// Dot-separated field path (e.g., "refresh.stats_interval_ms").
        field: String,
        /// String representation of the invalid value.
        value: String,
        /// Human-readable explanation of the constraint.
        reason: String,
    },

    /// File I/O error.
    #[error("IO error reading {file}: {source}")]
    Io {
        /// Path of the file that could not be read.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

fn summarize(violations: &[ConfigError]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn non_zero(errors: &mut Vec<ConfigError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ConfigError::InvalidField {
            field: field.into(),
            value: "0".into(),
            reason: "must be at least 1ms".into(),
        });
    }
}

fn endpoint_path(errors: &mut Vec<ConfigError>, field: &str, value: &str) {
    if !value.starts_with('/') {
        errors.push(ConfigError::InvalidField {
            field: field.into(),
            value: format!("{value:?}"),
            reason: "endpoint paths must start with '/'".into(),
        });
    }
}

/// Validate all semantic constraints on a [`LiveConfig`].
///
/// Collects every violation before returning so the caller sees the full
/// scope of issues at once.
///
/// # Panics
///
/// This function never panics.
pub fn validate(config: &LiveConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // ── Cadences ─────────────────────────────────────────────────────
    non_zero(&mut errors, "refresh.stats_interval_ms", config.refresh.stats_interval_ms);
    non_zero(&mut errors, "refresh.charts_interval_ms", config.refresh.charts_interval_ms);
    non_zero(&mut errors, "refresh.listing_interval_ms", config.refresh.listing_interval_ms);
    non_zero(&mut errors, "search.debounce_ms", config.search.debounce_ms);

    // ── Animation ────────────────────────────────────────────────────
    non_zero(&mut errors, "animation.frame_interval_ms", config.animation.frame_interval_ms);
    if config.animation.frame_interval_ms > config.animation.duration_ms
        && config.animation.duration_ms > 0
    {
        errors.push(ConfigError::InvalidField {
            field: "animation.frame_interval_ms".into(),
            value: config.animation.frame_interval_ms.to_string(),
            reason: "must be \u{2264} animation.duration_ms".into(),
        });
    }

    // ── Notifications ────────────────────────────────────────────────
    let n = &config.notifications;
    if n.default_duration_ms > 0 && n.enter_delay_ms >= n.default_duration_ms {
        errors.push(ConfigError::InvalidField {
            field: "notifications.enter_delay_ms".into(),
            value: n.enter_delay_ms.to_string(),
            reason: "must be < notifications.default_duration_ms".into(),
        });
    }

    // ── Endpoints ────────────────────────────────────────────────────
    let e = &config.endpoints;
    if e.base_url.trim().is_empty() {
        errors.push(ConfigError::InvalidField {
            field: "endpoints.base_url".into(),
            value: String::new(),
            reason: "base URL must not be empty".into(),
        });
    }
    endpoint_path(&mut errors, "endpoints.stats", &e.stats);
    endpoint_path(&mut errors, "endpoints.activity", &e.activity);
    endpoint_path(&mut errors, "endpoints.users", &e.users);
    endpoint_path(&mut errors, "endpoints.logs", &e.logs);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate `config` read from `source`, folding every violation into a
/// single [`ConfigError::Validation`] that names the source.
pub fn check(config: &LiveConfig, source: &str) -> Result<(), ConfigError> {
    validate(config).map_err(|violations| ConfigError::Validation {
        file: source.to_string(),
        violations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_field(errors: &[ConfigError], name: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidField { field, .. } if field == name))
    }

    #[test]
    fn test_validate_default_config_passes() {
        assert!(validate(&LiveConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_stats_interval_fails() {
        let mut config = LiveConfig::default();
        config.refresh.stats_interval_ms = 0;
        let errors = validate(&config).unwrap_err();
        assert!(has_field(&errors, "refresh.stats_interval_ms"));
    }

    #[test]
    fn test_validate_zero_charts_and_listing_intervals_fail() {
        let mut config = LiveConfig::default();
        config.refresh.charts_interval_ms = 0;
        config.refresh.listing_interval_ms = 0;
        let errors = validate(&config).unwrap_err();
        assert!(has_field(&errors, "refresh.charts_interval_ms"));
        assert!(has_field(&errors, "refresh.listing_interval_ms"));
    }

    #[test]
    fn test_validate_zero_debounce_fails() {
        let mut config = LiveConfig::default();
        config.search.debounce_ms = 0;
        assert!(has_field(&validate(&config).unwrap_err(), "search.debounce_ms"));
    }

    #[test]
    fn test_validate_zero_frame_interval_fails() {
        let mut config = LiveConfig::default();
        config.animation.frame_interval_ms = 0;
        assert!(has_field(
            &validate(&config).unwrap_err(),
            "animation.frame_interval_ms"
        ));
    }

    #[test]
    fn test_validate_frame_longer_than_animation_fails() {
        let mut config = LiveConfig::default();
        config.animation.duration_ms = 10;
        config.animation.frame_interval_ms = 50;
        assert!(has_field(
            &validate(&config).unwrap_err(),
            "animation.frame_interval_ms"
        ));
    }

    #[test]
    fn test_validate_enter_delay_not_shorter_than_lifetime_fails() {
        let mut config = LiveConfig::default();
        config.notifications.default_duration_ms = 100;
        config.notifications.enter_delay_ms = 100;
        assert!(has_field(
            &validate(&config).unwrap_err(),
            "notifications.enter_delay_ms"
        ));
    }

    #[test]
    fn test_validate_sticky_default_allows_any_enter_delay() {
        let mut config = LiveConfig::default();
        config.notifications.default_duration_ms = 0;
        config.notifications.enter_delay_ms = 500;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_empty_base_url_fails() {
        let mut config = LiveConfig::default();
        config.endpoints.base_url = "  ".into();
        assert!(has_field(&validate(&config).unwrap_err(), "endpoints.base_url"));
    }

    #[test]
    fn test_validate_relative_endpoint_fails() {
        let mut config = LiveConfig::default();
        config.endpoints.stats = "admin/api/estadisticas".into();
        config.endpoints.logs = "logs".into();
        let errors = validate(&config).unwrap_err();
        assert!(has_field(&errors, "endpoints.stats"));
        assert!(has_field(&errors, "endpoints.logs"));
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = LiveConfig::default();
        config.refresh.stats_interval_ms = 0;
        config.search.debounce_ms = 0;
        config.endpoints.users = "users".into();
        assert_eq!(validate(&config).unwrap_err().len(), 3);
    }

    #[test]
    fn test_invalid_field_display_includes_field_and_reason() {
        let err = ConfigError::InvalidField {
            field: "search.debounce_ms".into(),
            value: "0".into(),
            reason: "must be at least 1ms".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("search.debounce_ms"));
        assert!(msg.contains("at least 1ms"));
    }

    #[test]
    fn test_check_names_source_and_keeps_every_violation() {
        let mut config = LiveConfig::default();
        config.refresh.stats_interval_ms = 0;
        config.search.debounce_ms = 0;

        let err = check(&config, "console.toml").expect_err("test: must fail");
        let message = err.to_string();
        assert!(message.contains("console.toml"), "got: {message}");
        assert!(message.contains("search.debounce_ms"), "got: {message}");
        match err {
            ConfigError::Validation { violations, .. } => {
                assert_eq!(violations.len(), 2);
                assert!(has_field(&violations, "refresh.stats_interval_ms"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}

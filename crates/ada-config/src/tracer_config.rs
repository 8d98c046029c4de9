//! Validates the recognized configuration options (§6) as pure data: field
//! ranges, module-name syntax, and trigger parsing. Does not implement a
//! CLI or read any particular wire format — a caller hands in already-split
//! string values (from flags, a config file, environment, wherever) and
//! gets back a validated [`TracerConfig`] or the first [`ConfigError`].

use crate::error::ConfigError;
use crate::trigger::TriggerConfig;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

const MAX_DURATION_SECONDS: u32 = 86_400;
const MAX_STACK_BYTES: u32 = 512;
const MAX_ROLL_SECONDS: u32 = 86_400;

fn module_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-/]+$").expect("module name pattern is valid"))
}

/// Raw, unvalidated config values, as a caller would assemble them from
/// whatever source holds them (flags, file, environment, or — via
/// `#[derive(Deserialize)]` — a config file deserialized with `serde_json`/
/// `toml`/whatever format the embedding host prefers).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawTracerConfig {
    pub output_dir: String,
    pub duration_seconds: u32,
    pub stack_bytes: u32,
    pub pre_roll_seconds: u32,
    pub post_roll_seconds: u32,
    pub triggers: Vec<String>,
    pub exclude: Vec<String>,
}

/// A validated tracer configuration.
#[derive(Debug, Clone)]
pub struct TracerConfig {
    pub output_dir: String,
    pub duration_seconds: u32,
    pub stack_bytes: u32,
    pub pre_roll_seconds: u32,
    pub post_roll_seconds: u32,
    pub triggers: Vec<TriggerConfig>,
    pub exclude: Vec<String>,
}

fn check_range(name: &'static str, value: u32, max: u32) -> Result<(), ConfigError> {
    if value > max {
        return Err(ConfigError::InvalidArgument(format!("{name} must be between 0 and {max}, got {value}")));
    }
    Ok(())
}

impl TracerConfig {
    /// Validates `raw`, rejecting the first out-of-range field or malformed
    /// trigger/module entry it finds.
    pub fn validate(raw: RawTracerConfig) -> Result<Self, ConfigError> {
        if raw.output_dir.is_empty() {
            return Err(ConfigError::InvalidArgument("output_dir must not be empty".into()));
        }
        check_range("duration_seconds", raw.duration_seconds, MAX_DURATION_SECONDS)?;
        check_range("stack_bytes", raw.stack_bytes, MAX_STACK_BYTES)?;
        check_range("pre_roll_seconds", raw.pre_roll_seconds, MAX_ROLL_SECONDS)?;
        check_range("post_roll_seconds", raw.post_roll_seconds, MAX_ROLL_SECONDS)?;

        for module in &raw.exclude {
            if !module_name_pattern().is_match(module) {
                return Err(ConfigError::InvalidArgument(format!("exclude[] entry is not a valid module name: {module:?}")));
            }
        }

        let triggers = raw
            .triggers
            .iter()
            .map(|t| TriggerConfig::parse(t))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            output_dir: raw.output_dir,
            duration_seconds: raw.duration_seconds,
            stack_bytes: raw.stack_bytes,
            pre_roll_seconds: raw.pre_roll_seconds,
            post_roll_seconds: raw.post_roll_seconds,
            triggers,
            exclude: raw.exclude,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_raw() -> RawTracerConfig {
        RawTracerConfig {
            output_dir: "/tmp/traces".to_string(),
            duration_seconds: 60,
            stack_bytes: 128,
            pre_roll_seconds: 5,
            post_roll_seconds: 5,
            triggers: vec!["crash".to_string(), "symbol=libc.so::malloc".to_string()],
            exclude: vec!["libssl.so".to_string(), "vendor/thirdparty.so".to_string()],
        }
    }

    #[test]
    fn accepts_a_well_formed_config() {
        let cfg = TracerConfig::validate(minimal_raw()).unwrap();
        assert_eq!(cfg.triggers.len(), 2);
        assert_eq!(cfg.exclude.len(), 2);
    }

    #[test]
    fn rejects_empty_output_dir() {
        let mut raw = minimal_raw();
        raw.output_dir = String::new();
        assert!(TracerConfig::validate(raw).is_err());
    }

    #[test]
    fn rejects_out_of_range_duration() {
        let mut raw = minimal_raw();
        raw.duration_seconds = MAX_DURATION_SECONDS + 1;
        assert!(TracerConfig::validate(raw).is_err());
    }

    #[test]
    fn rejects_out_of_range_stack_bytes() {
        let mut raw = minimal_raw();
        raw.stack_bytes = MAX_STACK_BYTES + 1;
        assert!(TracerConfig::validate(raw).is_err());
    }

    #[test]
    fn rejects_malformed_module_name_in_exclude() {
        let mut raw = minimal_raw();
        raw.exclude = vec!["not a module name!".to_string()];
        assert!(TracerConfig::validate(raw).is_err());
    }

    #[test]
    fn rejects_malformed_trigger() {
        let mut raw = minimal_raw();
        raw.triggers = vec!["bogus-trigger".to_string()];
        assert!(TracerConfig::validate(raw).is_err());
    }

    #[test]
    fn deserializes_from_json() {
        let raw: RawTracerConfig = serde_json::from_str(
            r#"{"output_dir": "/tmp/traces", "duration_seconds": 30, "stack_bytes": 64,
                "pre_roll_seconds": 1, "post_roll_seconds": 1,
                "triggers": ["crash"], "exclude": []}"#,
        )
        .unwrap();
        assert_eq!(raw.output_dir, "/tmp/traces");
        assert_eq!(raw.duration_seconds, 30);
        assert!(TracerConfig::validate(raw).is_ok());
    }

    #[test]
    fn boundary_values_at_max_are_accepted() {
        let mut raw = minimal_raw();
        raw.duration_seconds = MAX_DURATION_SECONDS;
        raw.stack_bytes = MAX_STACK_BYTES;
        raw.pre_roll_seconds = MAX_ROLL_SECONDS;
        raw.post_roll_seconds = MAX_ROLL_SECONDS;
        assert!(TracerConfig::validate(raw).is_ok());
    }
}

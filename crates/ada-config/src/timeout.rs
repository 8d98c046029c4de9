//! Startup timeout calibration (§6): how long the host process should wait
//! for the agent to finish installing hooks before giving up, scaled by
//! how many symbols it's instrumenting.

use crate::error::ConfigError;
use std::time::Duration;

const DEFAULT_WARM_UP_MS: u64 = 250;
const DEFAULT_PER_SYMBOL_COST_US: u64 = 40;
const DEFAULT_TOLERANCE_PERCENT: u64 = 50;

struct Calibration {
    warm_up_ms: u64,
    per_symbol_cost_us: u64,
    tolerance_percent: u64,
}

impl Calibration {
    fn from_env(env_lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let parse_or = |key: &str, default: u64| {
            env_lookup(key).and_then(|v| v.parse::<u64>().ok()).unwrap_or(default)
        };
        Self {
            warm_up_ms: parse_or("ADA_STARTUP_WARM_UP_DURATION", DEFAULT_WARM_UP_MS),
            per_symbol_cost_us: parse_or("ADA_STARTUP_PER_SYMBOL_COST", DEFAULT_PER_SYMBOL_COST_US),
            tolerance_percent: parse_or("ADA_STARTUP_TIMEOUT_TOLERANCE", DEFAULT_TOLERANCE_PERCENT),
        }
    }
}

/// Computes how long to wait for agent startup given how many symbols will
/// be instrumented. `ADA_STARTUP_TIMEOUT` (milliseconds), if set, overrides
/// the calibration entirely. Otherwise:
///
/// `timeout = (warm_up + per_symbol_cost * symbol_count) * (1 + tolerance)`
///
/// with `warm_up`, `per_symbol_cost`, and `tolerance` each individually
/// overridable via `ADA_STARTUP_WARM_UP_DURATION` (ms),
/// `ADA_STARTUP_PER_SYMBOL_COST` (µs), and `ADA_STARTUP_TIMEOUT_TOLERANCE`
/// (whole percent), defaulting to 250ms / 40µs / 50%.
pub fn calibrate_startup_timeout(
    symbol_count: u32,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<Duration, ConfigError> {
    if let Some(raw) = env_lookup("ADA_STARTUP_TIMEOUT") {
        let ms: u64 = raw
            .parse()
            .map_err(|_| ConfigError::Parse(format!("ADA_STARTUP_TIMEOUT is not a valid integer: {raw:?}")))?;
        return Ok(Duration::from_millis(ms));
    }

    let cal = Calibration::from_env(&env_lookup);
    let base_us = cal.warm_up_ms.saturating_mul(1_000)
        + cal.per_symbol_cost_us.saturating_mul(u64::from(symbol_count));
    let scaled_us = base_us.saturating_mul(100 + cal.tolerance_percent) / 100;
    Ok(Duration::from_micros(scaled_us))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn default_calibration_scales_with_symbol_count() {
        let zero_symbols = calibrate_startup_timeout(0, no_env).unwrap();
        let many_symbols = calibrate_startup_timeout(10_000, no_env).unwrap();
        assert!(many_symbols > zero_symbols);
        // base = 250ms, tolerance 50% -> 375ms at zero symbols.
        assert_eq!(zero_symbols, Duration::from_millis(375));
    }

    #[test]
    fn explicit_override_wins() {
        let env = |k: &str| if k == "ADA_STARTUP_TIMEOUT" { Some("9000".to_string()) } else { None };
        assert_eq!(calibrate_startup_timeout(50, env).unwrap(), Duration::from_millis(9000));
    }

    #[test]
    fn invalid_override_is_a_parse_error() {
        let env = |k: &str| if k == "ADA_STARTUP_TIMEOUT" { Some("soon".to_string()) } else { None };
        assert!(calibrate_startup_timeout(50, env).is_err());
    }

    #[test]
    fn custom_calibration_knobs_apply() {
        let env = |k: &str| match k {
            "ADA_STARTUP_WARM_UP_DURATION" => Some("0".to_string()),
            "ADA_STARTUP_PER_SYMBOL_COST" => Some("100".to_string()),
            "ADA_STARTUP_TIMEOUT_TOLERANCE" => Some("0".to_string()),
            _ => None,
        };
        let got = calibrate_startup_timeout(10, env).unwrap();
        assert_eq!(got, Duration::from_micros(1_000));
    }
}

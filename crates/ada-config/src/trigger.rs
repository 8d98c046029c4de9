//! Parses the `triggers[]` config strings from §6: `crash`,
//! `symbol=<module?::|@|:>sym`, `symbol~=<regex>`, `time=<seconds>`.
//!
//! The `symbol=`/`symbol~=` variants carry exactly the fields
//! [`ada_mark::TriggerSpec`] needs, so [`TriggerConfig::into_mark_spec`]
//! converts them directly; `crash` and `time=` triggers govern *when a
//! capture session starts* (a host-runtime concern this core doesn't
//! implement — the instrumentation engine decides how to act on them) and
//! are kept as plain data for that caller to read.

use crate::error::ConfigError;
use ada_mark::{MatchKind, MatchTarget, TriggerSpec};

/// One parsed entry from `triggers[]` (§6).
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerConfig {
    /// Begin capture on a crash/signal (host-runtime concern).
    Crash,
    /// Begin capture (or mark a detail window) when `symbol` in `module`
    /// (if given) is hit, matched literally.
    Symbol { module: Option<String>, symbol: String },
    /// As `Symbol`, but `pattern` is matched as a regular expression.
    SymbolRegex { pattern: String },
    /// Begin capture `seconds` after session start.
    Time { seconds: u32 },
}

/// Splits `"module::sym"` / `"module@sym"` / `"module:sym"` / `"sym"` into
/// `(module, symbol)`. Tries `::` before `@`/`:` so a module name that
/// itself contains a single `:` (unlikely, but not forbidden by §6's
/// `exclude[]` charset) doesn't get misparsed.
fn split_module_symbol(spec: &str) -> (Option<String>, String) {
    for sep in ["::", "@", ":"] {
        if let Some(idx) = spec.find(sep) {
            let module = &spec[..idx];
            let symbol = &spec[idx + sep.len()..];
            if !module.is_empty() && !symbol.is_empty() {
                return (Some(module.to_string()), symbol.to_string());
            }
        }
    }
    (None, spec.to_string())
}

impl TriggerConfig {
    /// Parses one `triggers[]` entry. Unrecognized syntax is a [`ConfigError::Parse`].
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw == "crash" {
            return Ok(Self::Crash);
        }
        if let Some(rest) = raw.strip_prefix("symbol~=") {
            if rest.is_empty() {
                return Err(ConfigError::Parse("symbol~= requires a regex pattern".into()));
            }
            return Ok(Self::SymbolRegex { pattern: rest.to_string() });
        }
        if let Some(rest) = raw.strip_prefix("symbol=") {
            if rest.is_empty() {
                return Err(ConfigError::Parse("symbol= requires a symbol name".into()));
            }
            let (module, symbol) = split_module_symbol(rest);
            return Ok(Self::Symbol { module, symbol });
        }
        if let Some(rest) = raw.strip_prefix("time=") {
            let seconds: u32 = rest
                .parse()
                .map_err(|_| ConfigError::Parse(format!("time= requires an integer, got {rest:?}")))?;
            if seconds > 86_400 {
                return Err(ConfigError::InvalidArgument("time= trigger exceeds 86400 seconds".into()));
            }
            return Ok(Self::Time { seconds });
        }
        Err(ConfigError::Parse(format!("unrecognized trigger: {raw:?}")))
    }

    /// Converts a symbol-based trigger into a mark-policy [`TriggerSpec`].
    /// `None` for `Crash`/`Time`, which aren't marking rules.
    ///
    /// Case-sensitivity isn't expressible in the `triggers[]` string
    /// format, so symbol triggers compile into case-insensitive mark rules
    /// by default — the same default the rest of this workspace's example
    /// scenarios (§8 Scenario 3) use.
    pub fn into_mark_spec(self) -> Option<TriggerSpec> {
        match self {
            Self::Symbol { module, symbol } => Some(TriggerSpec {
                target: Some(MatchTarget::Symbol),
                match_kind: MatchKind::Literal,
                pattern: Some(symbol),
                case_sensitive: false,
                module_name: module,
            }),
            Self::SymbolRegex { pattern } => Some(TriggerSpec {
                target: Some(MatchTarget::Symbol),
                match_kind: MatchKind::Regex,
                pattern: Some(pattern),
                case_sensitive: false,
                module_name: None,
            }),
            Self::Crash | Self::Time { .. } => None,
        }
    }
}

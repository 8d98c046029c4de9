//! Marking policy (§4.F): compiled pattern rules matched against a
//! `(symbol, module, message)` probe at each call/return event, deciding
//! whether the detail lane should open or extend a window.

use std::sync::atomic::{AtomicU64, Ordering};

/// Which field of the probe a rule matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTarget {
    Symbol,
    Module,
    Message,
}

/// Whether a rule's pattern is a plain substring or a regular expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Literal,
    Regex,
}

/// One unvalidated rule as parsed from configuration (§6 `triggers[]`).
#[derive(Debug, Clone)]
pub struct TriggerSpec {
    pub target: Option<MatchTarget>,
    pub match_kind: MatchKind,
    pub pattern: Option<String>,
    pub case_sensitive: bool,
    pub module_name: Option<String>,
}

/// The probe a call/return event is checked against.
#[derive(Debug, Clone, Copy)]
pub struct Probe<'a> {
    pub symbol: &'a str,
    pub module: &'a str,
    pub message: &'a str,
}

enum Matcher {
    Literal(String, bool),
    Regex(regex::Regex),
}

impl Matcher {
    /// Full-string equality for `Literal` (not substring containment), ASCII
    /// case-folded when `!case_sensitive`. Per §4.F, an empty pattern or an
    /// empty (null) probe field never matches, regardless of match kind.
    fn is_match(&self, haystack: &str) -> bool {
        if haystack.is_empty() {
            return false;
        }
        match self {
            Matcher::Literal(needle, case_sensitive) => {
                if needle.is_empty() {
                    return false;
                }
                if *case_sensitive {
                    haystack == needle
                } else {
                    haystack.eq_ignore_ascii_case(needle)
                }
            }
            Matcher::Regex(re) => re.is_match(haystack),
        }
    }
}

/// A single compiled rule: which field to look at, an optional module-name
/// qualifier, and the compiled matcher.
pub struct MarkRule {
    target: MatchTarget,
    module_name: Option<String>,
    case_sensitive: bool,
    matcher: Matcher,
}

impl MarkRule {
    fn probe_field<'a>(&self, probe: &Probe<'a>) -> &'a str {
        match self.target {
            MatchTarget::Symbol => probe.symbol,
            MatchTarget::Module => probe.module,
            MatchTarget::Message => probe.message,
        }
    }

    fn matches(&self, probe: &Probe<'_>) -> bool {
        if let Some(module_name) = &self.module_name {
            // Missing module on the probe fails the rule even if empty
            // happened to equal empty; §4.F requires the module to match
            // under the same case rule as the rest of the pattern.
            if probe.module.is_empty() {
                return false;
            }
            let module_matches = if self.case_sensitive {
                probe.module == module_name
            } else {
                probe.module.eq_ignore_ascii_case(module_name)
            };
            if !module_matches {
                return false;
            }
        }
        self.matcher.is_match(self.probe_field(probe))
    }
}

/// A compiled set of [`MarkRule`]s. Built once (at session start or config
/// reload) and matched many times from the hot call/return path, so
/// compilation cost — including regex compilation and its fallback — is
/// paid up front, never per-probe.
pub struct MarkPolicy {
    rules: Vec<MarkRule>,
    compile_failures: AtomicU64,
}

impl MarkPolicy {
    /// Compiles `specs` into a policy, skipping any entry missing a
    /// required field (`target` or `pattern`) rather than failing the
    /// whole build — a malformed single rule shouldn't disable every other
    /// trigger. Regex rules whose pattern fails to compile fall back to a
    /// literal match on the same pattern text and bump `compile_failures`,
    /// per the best-effort construction semantics the spec calls for.
    pub fn build(specs: Vec<TriggerSpec>) -> Self {
        let compile_failures = AtomicU64::new(0);
        let mut rules = Vec::with_capacity(specs.len());
        for spec in specs {
            let (Some(target), Some(pattern)) = (spec.target, spec.pattern) else {
                continue;
            };
            // An empty pattern never matches (§4.F); still install the rule
            // rather than skipping it, so `rule_count()` reflects every
            // well-formed trigger the caller configured.
            let matcher = if pattern.is_empty() {
                Matcher::Literal(pattern, spec.case_sensitive)
            } else {
                match spec.match_kind {
                    MatchKind::Literal => Matcher::Literal(pattern, spec.case_sensitive),
                    MatchKind::Regex => {
                        let pattern_text = if spec.case_sensitive {
                            pattern.clone()
                        } else {
                            format!("(?i){pattern}")
                        };
                        match regex::Regex::new(&pattern_text) {
                            Ok(re) => Matcher::Regex(re),
                            Err(_) => {
                                compile_failures.fetch_add(1, Ordering::Relaxed);
                                Matcher::Literal(pattern, spec.case_sensitive)
                            }
                        }
                    }
                }
            };
            rules.push(MarkRule {
                target,
                module_name: spec.module_name,
                case_sensitive: spec.case_sensitive,
                matcher,
            });
        }
        Self { rules, compile_failures }
    }

    /// Whether any compiled rule matches `probe`.
    pub fn matches(&self, probe: &Probe<'_>) -> bool {
        self.rules.iter().any(|r| r.matches(probe))
    }

    #[inline]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    #[inline]
    pub fn compile_failures(&self) -> u64 {
        self.compile_failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(target: MatchTarget, kind: MatchKind, pattern: &str) -> TriggerSpec {
        TriggerSpec {
            target: Some(target),
            match_kind: kind,
            pattern: Some(pattern.to_string()),
            case_sensitive: false,
            module_name: None,
        }
    }

    #[test]
    fn literal_rule_matches_full_string_case_insensitively() {
        let policy = MarkPolicy::build(vec![spec(MatchTarget::Symbol, MatchKind::Literal, "ErrorPath")]);
        assert!(policy.matches(&Probe {
            symbol: "errorpath",
            module: "m",
            message: ""
        }));
        // A proper substring is not a full-string match (§4.F: full-string
        // equality, not containment).
        assert!(!policy.matches(&Probe {
            symbol: "handle_errorpath_slow",
            module: "m",
            message: ""
        }));
        assert!(!policy.matches(&Probe {
            symbol: "handle_ok",
            module: "m",
            message: ""
        }));
    }

    #[test]
    fn empty_pattern_never_matches() {
        let policy = MarkPolicy::build(vec![spec(MatchTarget::Symbol, MatchKind::Literal, "")]);
        assert_eq!(policy.rule_count(), 1);
        assert!(!policy.matches(&Probe {
            symbol: "anything",
            module: "m",
            message: ""
        }));
        assert!(!policy.matches(&Probe {
            symbol: "",
            module: "m",
            message: ""
        }));
    }

    #[test]
    fn empty_probe_field_never_matches() {
        let policy = MarkPolicy::build(vec![spec(MatchTarget::Symbol, MatchKind::Literal, "critical")]);
        assert!(!policy.matches(&Probe {
            symbol: "",
            module: "m",
            message: ""
        }));
    }

    #[test]
    fn regex_rule_matches() {
        let policy = MarkPolicy::build(vec![spec(MatchTarget::Message, MatchKind::Regex, r"timeout after \d+ms")]);
        assert!(policy.matches(&Probe {
            symbol: "",
            module: "",
            message: "timeout after 250ms"
        }));
        assert_eq!(policy.compile_failures(), 0);
    }

    #[test]
    fn invalid_regex_falls_back_to_literal_and_counts_failure() {
        let policy = MarkPolicy::build(vec![spec(MatchTarget::Message, MatchKind::Regex, "(unterminated")]);
        assert_eq!(policy.compile_failures(), 1);
        assert!(policy.matches(&Probe {
            symbol: "",
            module: "",
            message: "(unterminated"
        }));
        assert!(!policy.matches(&Probe {
            symbol: "",
            module: "",
            message: "this has (unterminated in it"
        }));
    }

    #[test]
    fn missing_required_fields_are_skipped_not_fatal() {
        let bad = TriggerSpec {
            target: None,
            match_kind: MatchKind::Literal,
            pattern: Some("x".into()),
            case_sensitive: true,
            module_name: None,
        };
        let policy = MarkPolicy::build(vec![bad]);
        assert_eq!(policy.rule_count(), 0);
    }

    #[test]
    fn module_name_qualifier_restricts_match() {
        let mut s = spec(MatchTarget::Symbol, MatchKind::Literal, "foo");
        s.module_name = Some("libfoo.so".to_string());
        let policy = MarkPolicy::build(vec![s]);
        assert!(policy.matches(&Probe {
            symbol: "foo",
            module: "libfoo.so",
            message: ""
        }));
        assert!(!policy.matches(&Probe {
            symbol: "foo",
            module: "libother.so",
            message: ""
        }));
        // missing module on the probe fails the rule even though the
        // symbol itself matches.
        assert!(!policy.matches(&Probe {
            symbol: "foo",
            module: "",
            message: ""
        }));
    }

    #[test]
    fn module_name_qualifier_folds_case_when_rule_is_case_insensitive() {
        // `spec(...)` builds with `case_sensitive: false`, matching how
        // `trigger.rs::into_mark_spec` compiles `symbol=<module>::<sym>`.
        let mut s = spec(MatchTarget::Symbol, MatchKind::Literal, "malloc");
        s.module_name = Some("LibC.so".to_string());
        let policy = MarkPolicy::build(vec![s]);
        assert!(policy.matches(&Probe {
            symbol: "malloc",
            module: "libc.so",
            message: ""
        }));
    }

    #[test]
    fn module_name_qualifier_stays_case_sensitive_when_rule_requires_it() {
        let policy = MarkPolicy::build(vec![TriggerSpec {
            target: Some(MatchTarget::Symbol),
            match_kind: MatchKind::Literal,
            pattern: Some("malloc".to_string()),
            case_sensitive: true,
            module_name: Some("LibC.so".to_string()),
        }]);
        assert!(!policy.matches(&Probe {
            symbol: "malloc",
            module: "libc.so",
            message: ""
        }));
        assert!(policy.matches(&Probe {
            symbol: "malloc",
            module: "LibC.so",
            message: ""
        }));
    }
}

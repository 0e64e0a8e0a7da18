//! Engine configuration.
//!
//! Reads:
//! - `DMP_EVAL_CHECK_TIMEOUT_SECS` (default 30, `0` disables the timeout)
//! - `DMP_EVAL_CONCURRENCY` (default 1, sequential)
//! - `DMP_EVAL_UNKNOWN_REPORT`: `create` (default) or `reject`
//! - `DMP_EVAL_DEDUPE_TESTS`: `true`/`false` (default false)

use std::str::FromStr;
use std::time::Duration;

use crate::dispatch::DispatchConfig;
use crate::error::{EvalError, Result};

const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// What to do when a caller names a report id that does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownReportPolicy {
    /// Start a fresh report with a new id.
    #[default]
    CreateNew,
    /// Fail with `NotFound { kind: "report" }`.
    Reject,
}

impl FromStr for UnknownReportPolicy {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" | "create_new" => Ok(UnknownReportPolicy::CreateNew),
            "reject" => Ok(UnknownReportPolicy::Reject),
            other => Err(EvalError::InvalidInput(format!(
                "unknown report policy '{other}', expected 'create' or 'reject'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Per-check time limit; `None` waits indefinitely.
    pub check_timeout: Option<Duration>,
    /// Checks of one batch in flight at once. Results keep catalog order.
    pub concurrency: usize,
    pub unknown_report: UnknownReportPolicy,
    /// Evaluate a test once per benchmark even if several metrics list it.
    pub dedupe_tests: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_timeout: Some(DEFAULT_CHECK_TIMEOUT),
            concurrency: 1,
            unknown_report: UnknownReportPolicy::CreateNew,
            dedupe_tests: false,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup("DMP_EVAL_CHECK_TIMEOUT_SECS") {
            let secs: u64 = parse_var("DMP_EVAL_CHECK_TIMEOUT_SECS", &raw)?;
            config.check_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(raw) = lookup("DMP_EVAL_CONCURRENCY") {
            let n: usize = parse_var("DMP_EVAL_CONCURRENCY", &raw)?;
            if n == 0 {
                return Err(EvalError::InvalidInput(
                    "DMP_EVAL_CONCURRENCY must be at least 1".to_string(),
                ));
            }
            config.concurrency = n;
        }
        if let Some(raw) = lookup("DMP_EVAL_UNKNOWN_REPORT") {
            config.unknown_report = raw.parse()?;
        }
        if let Some(raw) = lookup("DMP_EVAL_DEDUPE_TESTS") {
            config.dedupe_tests = parse_var("DMP_EVAL_DEDUPE_TESTS", &raw)?;
        }
        Ok(config)
    }

    pub fn with_check_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.check_timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_unknown_report(mut self, policy: UnknownReportPolicy) -> Self {
        self.unknown_report = policy;
        self
    }

    pub fn with_dedupe_tests(mut self, dedupe: bool) -> Self {
        self.dedupe_tests = dedupe;
        self
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            check_timeout: self.check_timeout,
            concurrency: self.concurrency,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| EvalError::InvalidInput(format!("{name}={raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<EngineConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.check_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.unknown_report, UnknownReportPolicy::CreateNew);
        assert!(!config.dedupe_tests);
    }

    #[test]
    fn reads_every_variable() {
        let config = from_pairs(&[
            ("DMP_EVAL_CHECK_TIMEOUT_SECS", "5"),
            ("DMP_EVAL_CONCURRENCY", "4"),
            ("DMP_EVAL_UNKNOWN_REPORT", "Reject"),
            ("DMP_EVAL_DEDUPE_TESTS", "true"),
        ])
        .unwrap();
        assert_eq!(config.check_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.unknown_report, UnknownReportPolicy::Reject);
        assert!(config.dedupe_tests);
    }

    #[test]
    fn zero_timeout_disables_it() {
        let config = from_pairs(&[("DMP_EVAL_CHECK_TIMEOUT_SECS", "0")]).unwrap();
        assert_eq!(config.check_timeout, None);
    }

    #[test]
    fn invalid_values_are_invalid_input() {
        for pairs in [
            [("DMP_EVAL_CHECK_TIMEOUT_SECS", "soon")],
            [("DMP_EVAL_CONCURRENCY", "0")],
            [("DMP_EVAL_UNKNOWN_REPORT", "ignore")],
            [("DMP_EVAL_DEDUPE_TESTS", "maybe")],
        ] {
            assert!(matches!(from_pairs(&pairs), Err(EvalError::InvalidInput(_))));
        }
    }

    #[test]
    fn builder_clamps_concurrency() {
        let config = EngineConfig::default().with_concurrency(0);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.dispatch_config().concurrency, 1);
    }
}

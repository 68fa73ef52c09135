//! Session configuration.
//!
//! Defaults suit an interactive editor: unbounded undo history, feedback
//! loops allowed, eight buses in a new document. Hosts can deserialize a
//! [`SessionConfig`] from their own settings file or read it from the
//! `VSYNTH_*` environment variables.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::derive::CyclePolicy;
use crate::document::DEFAULT_BUS_COUNT;

pub const HISTORY_LIMIT_VAR: &str = "VSYNTH_HISTORY_LIMIT";
pub const CYCLE_POLICY_VAR: &str = "VSYNTH_CYCLE_POLICY";
pub const BUS_COUNT_VAR: &str = "VSYNTH_BUS_COUNT";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value '{value}' for {variable}: {reason}")]
pub struct ConfigError {
    pub variable: &'static str,
    pub value: String,
    pub reason: String,
}

/// Settings of an editing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Past snapshots kept for undo. `None` keeps all of them.
    pub history_limit: Option<usize>,
    pub cycle_policy: CyclePolicy,
    /// Bus count of documents created by the session.
    pub bus_count: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            history_limit: None,
            cycle_policy: CyclePolicy::Allow,
            bus_count: DEFAULT_BUS_COUNT,
        }
    }
}

impl SessionConfig {
    /// Reads overrides from the process environment. Unset variables keep
    /// their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads overrides through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = SessionConfig::default();

        if let Some(value) = lookup(HISTORY_LIMIT_VAR) {
            config.history_limit = match value.trim() {
                "" | "none" | "unlimited" => None,
                raw => Some(raw.parse().map_err(|e: std::num::ParseIntError| ConfigError {
                    variable: HISTORY_LIMIT_VAR,
                    value: value.clone(),
                    reason: e.to_string(),
                })?),
            };
        }

        if let Some(value) = lookup(CYCLE_POLICY_VAR) {
            config.cycle_policy = value.parse().map_err(|reason| ConfigError {
                variable: CYCLE_POLICY_VAR,
                value: value.clone(),
                reason,
            })?;
        }

        if let Some(value) = lookup(BUS_COUNT_VAR) {
            let invalid = |reason: String| ConfigError {
                variable: BUS_COUNT_VAR,
                value: value.clone(),
                reason,
            };
            let count: u32 = value.trim().parse().map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?;
            if count == 0 {
                return Err(invalid("a document needs at least one bus".to_string()));
            }
            config.bus_count = count;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = SessionConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.bus_count, 8);
    }

    #[test]
    fn reads_every_variable() {
        let config = SessionConfig::from_lookup(lookup(&[
            ("VSYNTH_HISTORY_LIMIT", "50"),
            ("VSYNTH_CYCLE_POLICY", "reject"),
            ("VSYNTH_BUS_COUNT", "16"),
        ]))
        .unwrap();
        assert_eq!(config.history_limit, Some(50));
        assert_eq!(config.cycle_policy, CyclePolicy::Reject);
        assert_eq!(config.bus_count, 16);
    }

    #[test]
    fn rejects_bad_values() {
        let err = SessionConfig::from_lookup(lookup(&[("VSYNTH_BUS_COUNT", "0")])).unwrap_err();
        assert_eq!(err.variable, "VSYNTH_BUS_COUNT");

        let err =
            SessionConfig::from_lookup(lookup(&[("VSYNTH_CYCLE_POLICY", "sometimes")])).unwrap_err();
        assert_eq!(err.variable, "VSYNTH_CYCLE_POLICY");

        assert!(SessionConfig::from_lookup(lookup(&[("VSYNTH_HISTORY_LIMIT", "-3")])).is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "cycle_policy": "reject" }"#).unwrap();
        assert_eq!(config.cycle_policy, CyclePolicy::Reject);
        assert_eq!(config.history_limit, None);
        assert_eq!(config.bus_count, 8);
    }
}

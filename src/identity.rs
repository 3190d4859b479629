//! Operator resolution for shift closes.
//!
//! A shift close records who closed it. Rather than requiring `--operator` on
//! every close, the operator is resolved through a chain:
//!
//! 1. `--operator <name>`: explicit per-command override
//! 2. `PREBOX_OPERATOR` env var: set once per terminal session
//! 3. `operator` under `[general]` in `config.toml`
//!
//! An unresolved operator is not an error; the close is recorded without one.

use std::env;

use crate::config::Config;

/// Resolve the operator from the tiered resolution chain.
pub fn resolve_operator(explicit: Option<&str>, config: &Config) -> Option<String> {
    resolve(explicit, env::var("PREBOX_OPERATOR").ok().as_deref(), config)
}

fn resolve(explicit: Option<&str>, from_env: Option<&str>, config: &Config) -> Option<String> {
    // 1. Explicit --operator flag, then 2. PREBOX_OPERATOR, then 3. config.toml.
    [explicit, from_env, config.general.operator.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_wins() {
        // When an explicit operator is provided, it is returned immediately.
        // We can test this without touching the env.
        let mut config = Config::default();
        config.general.operator = Some("from-config".into());

        assert_eq!(resolve_operator(Some(" ana "), &config).as_deref(), Some("ana"));
    }

    #[test]
    fn blank_explicit_is_ignored() {
        assert_eq!(resolve(Some("  "), None, &Config::default()), None);
    }

    #[test]
    fn falls_back_through_env_then_config() {
        let mut config = Config::default();
        config.general.operator = Some(" ana ".into());

        assert_eq!(resolve(None, None, &config).as_deref(), Some("ana"));
        assert_eq!(resolve(Some(""), None, &config).as_deref(), Some("ana"));
        assert_eq!(resolve(None, Some("rui"), &config).as_deref(), Some("rui"));
        assert_eq!(resolve(None, Some(" "), &config).as_deref(), Some("ana"));
    }
}

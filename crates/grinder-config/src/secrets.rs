//! Runtime secret resolution.
//!
//! Config YAML stores only **env var NAMES** (e.g. `"GRINDER_MAIN_API_KEY"`,
//! following `grinder-isolation`'s engine-scoped `<ENGINE>_<VENUE>_API_KEY`
//! convention). At startup, callers invoke [`resolve_secrets_for_mode`] once
//! and pass the returned [`ResolvedSecrets`] into constructors rather than
//! scattering `std::env::var` calls across the codebase.
//!
//! `Debug` impls on secret-containing structs redact values; error messages
//! reference the env var NAME, never the value.

use anyhow::{bail, Result};
use serde_json::Value;

/// All runtime-resolved secrets for one engine instantiation.
///
/// Built once at startup via [`resolve_secrets_for_mode`].
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Exchange API key. `None` if the named env var was absent or empty.
    pub exchange_api_key: Option<String>,
    /// Exchange API secret. `None` if the named env var was absent or empty.
    pub exchange_api_secret: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "exchange_api_key",
                &self.exchange_api_key.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "exchange_api_secret",
                &self.exchange_api_secret.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

struct SecretEnvNames {
    exchange_api_key_var: String,
    exchange_api_secret_var: String,
}

/// Read a non-empty string value at `pointer` from a JSON config.
fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Resolve a named environment variable. Returns `None` if unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn parse_env_names(config_json: &Value) -> SecretEnvNames {
    SecretEnvNames {
        exchange_api_key_var: read_str_at(config_json, "/broker/keys_env/api_key")
            .unwrap_or_else(|| "GRINDER_API_KEY".to_string()),
        exchange_api_secret_var: read_str_at(config_json, "/broker/keys_env/api_secret")
            .unwrap_or_else(|| "GRINDER_API_SECRET".to_string()),
    }
}

/// Resolve exchange secrets from the environment for the given `mode`
/// string (case-insensitive: `"LIVE_TRADE"`, `"PAPER"`, or `"BACKTEST"`).
///
/// | Mode        | Required                               |
/// |-------------|-----------------------------------------|
/// | LIVE_TRADE  | exchange api_key, exchange api_secret    |
/// | PAPER       | exchange api_key, exchange api_secret    |
/// | BACKTEST    | nothing (all optional)                   |
///
/// Returns `Err` naming the first missing required env var; the value is
/// never mentioned.
pub fn resolve_secrets_for_mode(config_json: &Value, mode: &str) -> Result<ResolvedSecrets> {
    let names = parse_env_names(config_json);
    let mode_upper = mode.trim().to_ascii_uppercase();

    let exchange_api_key = resolve_env(&names.exchange_api_key_var);
    let exchange_api_secret = resolve_env(&names.exchange_api_secret_var);

    match mode_upper.as_str() {
        "LIVE_TRADE" | "PAPER" => {
            if exchange_api_key.is_none() {
                bail!(
                    "SECRETS_MISSING mode={mode_upper}: required env var '{}' \
                     (exchange api_key) is not set or empty",
                    names.exchange_api_key_var,
                );
            }
            if exchange_api_secret.is_none() {
                bail!(
                    "SECRETS_MISSING mode={mode_upper}: required env var '{}' \
                     (exchange api_secret) is not set or empty",
                    names.exchange_api_secret_var,
                );
            }
        }
        "BACKTEST" => {
            // No required secrets in BACKTEST — exchange keys are optional.
        }
        other => {
            bail!(
                "SECRETS_UNKNOWN_MODE: unrecognised mode '{other}'; \
                 expected one of: LIVE_TRADE | PAPER | BACKTEST",
            );
        }
    }

    Ok(ResolvedSecrets {
        exchange_api_key,
        exchange_api_secret,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn live_trade_requires_both_keys() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("GRINDER_TEST_KEY_A");
        std::env::remove_var("GRINDER_TEST_SECRET_A");
        let cfg = json!({
            "broker": {"keys_env": {"api_key": "GRINDER_TEST_KEY_A", "api_secret": "GRINDER_TEST_SECRET_A"}}
        });
        let err = resolve_secrets_for_mode(&cfg, "LIVE_TRADE").unwrap_err();
        assert!(err.to_string().contains("GRINDER_TEST_KEY_A"));
    }

    #[test]
    fn backtest_never_requires_keys() {
        let cfg = json!({});
        let resolved = resolve_secrets_for_mode(&cfg, "backtest").unwrap();
        assert!(resolved.exchange_api_key.is_none());
        assert!(resolved.exchange_api_secret.is_none());
    }

    #[test]
    fn paper_succeeds_once_both_env_vars_are_set() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("GRINDER_TEST_KEY_B", "k");
        std::env::set_var("GRINDER_TEST_SECRET_B", "s");
        let cfg = json!({
            "broker": {"keys_env": {"api_key": "GRINDER_TEST_KEY_B", "api_secret": "GRINDER_TEST_SECRET_B"}}
        });
        let resolved = resolve_secrets_for_mode(&cfg, "PAPER").unwrap();
        assert_eq!(resolved.exchange_api_key.as_deref(), Some("k"));
        assert_eq!(resolved.exchange_api_secret.as_deref(), Some("s"));
        std::env::remove_var("GRINDER_TEST_KEY_B");
        std::env::remove_var("GRINDER_TEST_SECRET_B");
    }

    #[test]
    fn debug_output_redacts_values() {
        let resolved = ResolvedSecrets {
            exchange_api_key: Some("super-secret".to_string()),
            exchange_api_secret: Some("also-secret".to_string()),
        };
        let rendered = format!("{resolved:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("also-secret"));
        assert!(rendered.contains("<REDACTED>"));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let cfg = json!({});
        let err = resolve_secrets_for_mode(&cfg, "SHADOW").unwrap_err();
        assert!(err.to_string().contains("SECRETS_UNKNOWN_MODE"));
    }
}

//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in the binary (or rely on lazy Once).
use std::str::FromStr;
use std::sync::Once;
use tracing::info;

static INIT: Once = Once::new();

/// Load .env exactly once. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        // Values already present in the process environment win over .env.
        let _ = dotenv::dotenv();
    });
}

/// Get optional env var (None if unset or blank).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// First non-blank value over an ordered list of keys, together with the key that won.
pub fn env_first(keys: &[&'static str]) -> Option<(&'static str, String)> {
    keys.iter()
        .find_map(|&k| env_opt(k).map(|v| (k, v)))
}

/// Get parsed value with default fallback.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match env_opt(key) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or(default),
        None => default,
    }
}

/// Mask anything that looks like a credential before it reaches a log line.
pub fn redact_value(key: &str, val: &str) -> String {
    let k = key.to_ascii_uppercase();
    let val_trim = val.trim();
    if val_trim.is_empty() {
        return String::new();
    }
    if k.contains("PASSWORD") || k.contains("SECRET") || k.contains("KEY") || k.contains("TOKEN")
    {
        // Keep a short prefix so operators can tell anon and service keys apart.
        let prefix: String = val_trim.chars().take(4).collect();
        return format!("{prefix}***");
    }
    val_trim.to_string()
}

/// Redacted snapshot of the given keys; unset keys map to an empty string.
pub fn preflight_snapshot(keys: &[&str]) -> Vec<(String, String)> {
    let snapshot: Vec<(String, String)> = keys
        .iter()
        .map(|&k| {
            let v = env_opt(k).unwrap_or_default();
            (k.to_string(), redact_value(k, &v))
        })
        .collect();
    info!(target = "preflight", snapshot = ?snapshot, "configuration snapshot");
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_keys_but_not_urls() {
        assert_eq!(
            redact_value("SUPABASE_SERVICE_KEY", "eyJhbGciOiJIUzI1NiJ9.payload"),
            "eyJh***"
        );
        assert_eq!(
            redact_value("SUPABASE_URL", " https://abc.supabase.co "),
            "https://abc.supabase.co"
        );
        assert_eq!(redact_value("SUPABASE_ANON_KEY", "   "), "");
    }

    #[test]
    fn env_first_skips_blank_values() {
        std::env::set_var("ATLAS_TEST_FIRST_A", "  ");
        std::env::set_var("ATLAS_TEST_FIRST_B", "second");
        assert_eq!(
            env_first(&["ATLAS_TEST_FIRST_MISSING", "ATLAS_TEST_FIRST_A", "ATLAS_TEST_FIRST_B"]),
            Some(("ATLAS_TEST_FIRST_B", "second".to_string()))
        );
        assert_eq!(env_first(&["ATLAS_TEST_FIRST_MISSING"]), None);
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        std::env::set_var("ATLAS_TEST_PARSE", "not-a-number");
        assert_eq!(env_parse::<u64>("ATLAS_TEST_PARSE", 30), 30);
        std::env::set_var("ATLAS_TEST_PARSE_OK", " 12 ");
        assert_eq!(env_parse::<u64>("ATLAS_TEST_PARSE_OK", 30), 12);
    }
}

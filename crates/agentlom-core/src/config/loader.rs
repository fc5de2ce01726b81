//! Small env-var reading helpers shared by every config struct.
//!
//! `.env` loading is best-effort: a missing file is not an error, and values
//! already present in the process environment always win.

use std::path::Path;
use std::sync::OnceLock;

static DOTENV_LOADED: OnceLock<()> = OnceLock::new();

/// Load `./.env` into the process environment, once per process.
pub fn load_dotenv() {
    DOTENV_LOADED.get_or_init(|| {
        let path = Path::new(".env");
        if let Ok(contents) = std::fs::read_to_string(path) {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    let key = key.trim();
                    if std::env::var(key).is_err() {
                        std::env::set_var(key, value.trim().trim_matches('"'));
                    }
                }
            }
        }
    });
}

/// Read `key`, falling back through `aliases` in order, then `default`.
pub fn env_or(key: &str, aliases: &[&str], default: impl FnOnce() -> String) -> String {
    env_optional(key, aliases).unwrap_or_else(default)
}

/// Read `key`, falling back through `aliases`. `None` if none are set or all empty.
pub fn env_optional(key: &str, aliases: &[&str]) -> Option<String> {
    std::env::var(key)
        .ok()
        .into_iter()
        .chain(aliases.iter().filter_map(|a| std::env::var(a).ok()))
        .find(|v| !v.trim().is_empty())
}

pub fn env_bool(key: &str, aliases: &[&str], default: bool) -> bool {
    match env_optional(key, aliases) {
        Some(v) => !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"),
        None => default,
    }
}

pub fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Expands a leading `~` or `~/` in a user-supplied path to the home
/// directory. Paths without a leading `~` pass through unchanged.
pub fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().into_owned();
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home.to_string_lossy().into_owned();
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_home_passes_through_absolute_paths() {
        assert_eq!(expand_home("/var/lib/agentlom"), "/var/lib/agentlom");
    }

    #[test]
    fn expand_home_expands_tilde_slash_prefix() {
        let expanded = expand_home("~/agentlom/state.json");
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("agentlom/state.json"));
    }
}

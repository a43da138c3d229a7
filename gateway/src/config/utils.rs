use std::path::PathBuf;
use std::str::FromStr;

/// Read an environment variable, treating empty values as unset
pub(super) fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parse an environment variable into `T`
pub(super) fn parse_env<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid {name} value '{value}': {e}")),
        None => Ok(None),
    }
}

/// Parse a boolean flag such as "true", "1", "yes" or "off"
pub(super) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read a boolean environment variable
pub(super) fn parse_env_bool(name: &str) -> Result<Option<bool>, String> {
    match env_var(name) {
        Some(value) => parse_bool(&value)
            .map(Some)
            .ok_or_else(|| format!("Invalid {name} value '{value}': expected true or false")),
        None => Ok(None),
    }
}

/// Hugging Face hub cache directory
///
/// Resolution order: `HF_HUB_CACHE`, `HF_HOME/hub`, `~/.cache/huggingface/hub`,
/// then `.cache/huggingface/hub` relative to the working directory.
pub fn default_hub_cache() -> PathBuf {
    if let Some(path) = env_var("HF_HUB_CACHE") {
        return PathBuf::from(path);
    }
    if let Some(home) = env_var("HF_HOME") {
        return PathBuf::from(home).join("hub");
    }
    let base = env_var("HOME")
        .map(|home| PathBuf::from(home).join(".cache"))
        .unwrap_or_else(|| PathBuf::from(".cache"));
    base.join("huggingface").join("hub")
}

use worker::Env;

use crate::config::Config;

pub fn normalize_env_value(raw: String) -> String {
    let trimmed = raw.trim();

    if let Some(inner) = trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return inner.trim().to_string();
    }
    if let Some(inner) = trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return inner.trim().to_string();
    }

    trimmed.to_string()
}

/// Vars and secrets share one namespace; secrets win.
pub fn env_string(env: &Env, key: &str) -> Option<String> {
    env.secret(key)
        .ok()
        .map(|v| v.to_string())
        .or_else(|| env.var(key).ok().map(|v| v.to_string()))
        .map(normalize_env_value)
        .filter(|s| !s.is_empty())
}

pub fn load_config(env: &Env) -> Config {
    Config::from_lookup(|key| env_string(env, key))
}

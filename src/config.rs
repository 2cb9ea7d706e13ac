//! Sync bridge configuration, loaded from environment variables.

use std::str::FromStr;

use tracing::warn;

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

const DEFAULT_GUARD_ACTIVE_INTERACTION: bool = false;
const DEFAULT_IMAGE_WIDTH: f64 = 300.0;
const DEFAULT_IMAGE_HEIGHT: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncConfig {
    /// Keep the local copy of the note or image under an active drag or
    /// resize when a snapshot arrives. Off: snapshots always win.
    pub guard_active_interaction: bool,
    /// World-space size given to newly uploaded images.
    pub default_image_width: f64,
    pub default_image_height: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            guard_active_interaction: DEFAULT_GUARD_ACTIVE_INTERACTION,
            default_image_width: DEFAULT_IMAGE_WIDTH,
            default_image_height: DEFAULT_IMAGE_HEIGHT,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            guard_active_interaction: env_parse("BOARD_GUARD_ACTIVE_INTERACTION", DEFAULT_GUARD_ACTIVE_INTERACTION),
            default_image_width: env_size("BOARD_DEFAULT_IMAGE_WIDTH", DEFAULT_IMAGE_WIDTH),
            default_image_height: env_size("BOARD_DEFAULT_IMAGE_HEIGHT", DEFAULT_IMAGE_HEIGHT),
        }
    }
}

/// Read and parse `key`, falling back to `default` when unset or invalid.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, value = %raw, "invalid config value; using default");
            default
        }
    }
}

/// Read a world-space size. Only finite, positive values are accepted.
fn env_size(key: &str, default: f64) -> f64 {
    let value = env_parse(key, default);
    if value.is_finite() && value > 0.0 {
        return value;
    }
    warn!(key, value, "size must be finite and positive; using default");
    default
}

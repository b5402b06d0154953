//! Job arena configuration.

use std::time::Duration;

/// Environment variable overriding the arena time slice, in milliseconds.
pub const TIME_SLICE_ENV: &str = "GPU_ARENA_TIME_SLICE_MS";

/// Default time slice per drain.
pub const DEFAULT_TIME_SLICE: Duration = Duration::from_millis(2);

/// Smallest accepted time slice, in milliseconds.
pub const MIN_TIME_SLICE_MS: u64 = 1;

/// Largest accepted time slice, in milliseconds.
pub const MAX_TIME_SLICE_MS: u64 = 1000;

/// Configuration for a [`JobArena`](crate::arena::JobArena).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Soft budget for one drain, checked between jobs.
    pub time_slice: Duration,
}

impl ArenaConfig {
    /// Build a configuration from the process environment.
    ///
    /// Reads [`TIME_SLICE_ENV`]; a missing or unparsable value leaves the
    /// default in place.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = std::env::var(TIME_SLICE_ENV) {
            match parse_time_slice(&value) {
                Some(slice) => config.time_slice = slice,
                None => log::warn!(
                    "Ignoring {}={:?}, using {:?}",
                    TIME_SLICE_ENV,
                    value,
                    config.time_slice
                ),
            }
        }
        config
    }

    pub fn with_time_slice(mut self, time_slice: Duration) -> Self {
        self.time_slice = time_slice;
        self
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            time_slice: DEFAULT_TIME_SLICE,
        }
    }
}

/// Parse a millisecond count, clamped to
/// [`MIN_TIME_SLICE_MS`]..=[`MAX_TIME_SLICE_MS`].
///
/// Returns `None` if `value` is not an integer.
pub fn parse_time_slice(value: &str) -> Option<Duration> {
    let ms: i64 = value.trim().parse().ok()?;
    let ms = ms.clamp(MIN_TIME_SLICE_MS as i64, MAX_TIME_SLICE_MS as i64) as u64;
    Some(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_slice() {
        assert_eq!(ArenaConfig::default().time_slice, Duration::from_millis(2));
    }

    #[test]
    fn test_parse_in_range() {
        assert_eq!(parse_time_slice("5"), Some(Duration::from_millis(5)));
        assert_eq!(parse_time_slice(" 16 "), Some(Duration::from_millis(16)));
    }

    #[test]
    fn test_parse_clamps() {
        assert_eq!(parse_time_slice("0"), Some(Duration::from_millis(1)));
        assert_eq!(parse_time_slice("-20"), Some(Duration::from_millis(1)));
        assert_eq!(parse_time_slice("250000"), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_time_slice(""), None);
        assert_eq!(parse_time_slice("fast"), None);
        assert_eq!(parse_time_slice("2.5"), None);
    }

    #[test]
    fn test_with_time_slice() {
        let config = ArenaConfig::default().with_time_slice(Duration::from_millis(8));
        assert_eq!(config.time_slice, Duration::from_millis(8));
    }
}

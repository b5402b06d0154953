//! Environment override of the arena time slice.
//!
//! Kept in its own test binary: it mutates the process environment.

use std::time::Duration;

use gpu_arena::config::{DEFAULT_TIME_SLICE, TIME_SLICE_ENV};
use gpu_arena::{ArenaConfig, ArenaRegistry};

fn set(value: &str) {
    // SAFETY: this binary has a single test, so no other thread reads the
    // environment concurrently.
    unsafe { std::env::set_var(TIME_SLICE_ENV, value) };
}

#[test]
fn test_time_slice_from_env() {
    // SAFETY: see `set`.
    unsafe { std::env::remove_var(TIME_SLICE_ENV) };
    assert_eq!(ArenaConfig::from_env().time_slice, DEFAULT_TIME_SLICE);

    set("12");
    assert_eq!(ArenaConfig::from_env().time_slice, Duration::from_millis(12));

    set("0");
    assert_eq!(ArenaConfig::from_env().time_slice, Duration::from_millis(1));

    set("999999");
    assert_eq!(ArenaConfig::from_env().time_slice, Duration::from_millis(1000));

    set("soon");
    assert_eq!(ArenaConfig::from_env().time_slice, DEFAULT_TIME_SLICE);

    set("7");
    let arenas = ArenaRegistry::from_env();
    assert_eq!(arenas.default_arena().time_slice(), Duration::from_millis(7));
    assert_eq!(
        arenas.arena_for(gpu_arena::ContextId(0)).time_slice(),
        Duration::from_millis(7)
    );
}

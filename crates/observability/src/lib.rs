//! Process-wide logging setup shared by every binary and test harness.

/// Install the JSON tracing subscriber (filter from `RUST_LOG`, default `info`).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    self::tracing::init();
}

/// Subscriber construction and filter defaults.
pub mod tracing;

//! Process-wide tracing setup shared by every binary.

/// Initialize JSON tracing with the `info` default filter.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init("info");
}

/// Like [`init`], with `default_filter` used when `RUST_LOG` is unset.
pub fn init_with(default_filter: &str) {
    tracing::init(default_filter);
}

/// Subscriber construction (filters, formatting).
pub mod tracing;

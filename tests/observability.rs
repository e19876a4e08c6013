//! Global subscriber installation. Lives in its own test binary because
//! the install is process-wide.

use psyframe::observability::{DEFAULT_FILTER, init_tracing};

#[test]
fn only_the_first_install_wins() {
    assert!(init_tracing(false));
    assert!(!init_tracing(true));
    assert!(!init_tracing(false));
}

#[test]
fn default_filter_targets_this_crate() {
    assert!(DEFAULT_FILTER.starts_with("psyframe="));
}

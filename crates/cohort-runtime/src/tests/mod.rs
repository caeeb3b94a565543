//! Test suites for the bootstrap runtime.

pub(crate) mod support;

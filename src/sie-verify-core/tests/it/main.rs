//! Consolidated integration tests for sie-verify-core.
//!
//! One test binary keeps proptest suites from running as competing
//! processes.
//! See: https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod enforcement;
mod fixtures;
mod registry;

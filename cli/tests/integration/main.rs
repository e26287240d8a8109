//! Integration tests for the canary binary
//!
//! These tests run the compiled binary with a controlled environment.

//! Common test utilities and helpers
//!
//! Shared fixtures for the integration tests: real git repositories built
//! with libgit2, workspace contexts in temporary directories, and assertions
//! over history and working-copy contents.

#![allow(dead_code)]

pub mod assertion_helpers;
pub mod ftp_server;
pub mod test_fixtures;
pub mod test_helpers;

//! Soundcheck CLI
//!
//! Runs and lists the E2E suites, checks the local environment and imports
//! audio into the app's object storage.

pub mod client;
pub mod commands;
pub mod output;

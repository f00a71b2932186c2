//! Integration test suite for declkit
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **appliance**: template sets persisted through the appliance store
//! - **cli**: the `declkit` binary end to end
//! - **providers**: filesystem and store providers side by side
//! - **render**: rendering the bundled templates

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod appliance;
mod cli;
mod providers;
mod render;

//! Test utilities for the form service.
//!
//! - `server_harness` - Spawn a real form service on a random port
//! - `fixtures` - Insert users and sessions directly into the database

pub mod fixtures;
pub mod server_harness;

pub use fixtures::{create_session, create_user, TestUser};
pub use server_harness::TestFormServer;

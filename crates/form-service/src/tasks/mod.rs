//! Background tasks for the form service.
//!
//! # Tasks
//!
//! - `identity_sweeper` - Drops expired entries from the identity store

pub mod identity_sweeper;

pub use identity_sweeper::start_identity_sweeper;

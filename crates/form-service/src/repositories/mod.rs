//! Repository layer for the form service.
//!
//! All queries are parameterized. Ownership checks happen in handlers; the
//! repositories scope writes by primary key once ownership is established.

pub mod affiliates;
pub mod forms;
pub mod submissions;
pub mod users;

pub use affiliates::AffiliatesRepository;
pub use forms::FormsRepository;
pub use submissions::SubmissionsRepository;
pub use users::{PgUserLookup, SessionsRepository};

//! HTTP request handlers for the form service.

pub mod affiliates;
pub mod auth;
pub mod forms;
pub mod health;
pub mod metrics;
pub mod submissions;

pub use affiliates::{create_affiliate, list_affiliates};
pub use auth::{get_me, logout};
pub use forms::{
    create_form, delete_form, get_form, list_forms, update_form_affiliates, update_form_data,
    update_form_meta,
};
pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
pub use submissions::{get_public_form, submit_form};

use crate::errors::FormError;
use crate::models::parse_resource_uuid;
use uuid::Uuid;

/// Parse a uuid path segment, rejecting anything but RFC 4122 v1-v7.
pub(crate) fn path_uuid(raw: &str) -> Result<Uuid, FormError> {
    parse_resource_uuid(raw).map_err(|msg| FormError::BadRequest(msg.to_string()))
}

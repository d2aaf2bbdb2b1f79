//! Form service models.
//!
//! Database rows, request bodies and response envelopes.

use crate::auth::ResolvedIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use std::collections::HashSet;
use uuid::Uuid;

// ============================================================================
// Health
// ============================================================================

/// Liveness response returned by `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

/// Readiness response returned by `/ready`.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    pub database: &'static str,

    /// Generic error message, no infrastructure details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Users
// ============================================================================

/// Public view of the authenticated user.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub uuid: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&ResolvedIdentity> for UserResponse {
    fn from(identity: &ResolvedIdentity) -> Self {
        Self {
            uuid: identity.uuid,
            email: identity.email.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub user: UserResponse,
}

// ============================================================================
// Forms
// ============================================================================

/// Maximum form name length in characters (matches the column width).
pub const MAX_FORM_NAME_LENGTH: usize = 255;

/// Base name given to newly created forms.
pub const UNTITLED_FORM_NAME: &str = "Untitled form";

/// Form definition stored in `forms.form_data`.
///
/// Steps are opaque to the backend; the builder UI owns their shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormData {
    pub steps: Vec<serde_json::Value>,
}

impl FormData {
    /// Every step must be a JSON object.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.steps.iter().all(serde_json::Value::is_object) {
            Ok(())
        } else {
            Err("Each step must be an object")
        }
    }
}

/// Form database row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FormRow {
    #[serde(skip)]
    pub id: i32,

    pub uuid: Uuid,

    /// Owner. Never serialized.
    #[serde(skip)]
    pub user_id: i32,

    pub name: String,

    pub description: Option<String>,

    pub form_data: Json<FormData>,

    pub views: i32,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl FormRow {
    pub fn is_owned_by(&self, identity: &ResolvedIdentity) -> bool {
        self.user_id == identity.user_id
    }
}

/// Affiliate summary embedded in form listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateInfo {
    pub uuid: Uuid,
    pub first_name: String,
    pub last_name: String,
}

/// One row of the detailed form listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FormListingRow {
    pub uuid: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub affiliates: Json<Vec<AffiliateInfo>>,
    pub submission_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormResponse {
    pub form: FormRow,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormListResponse {
    pub forms: Vec<FormListingRow>,
}

/// Request body for `PATCH /api/forms/{uuid}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateFormMetaRequest {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,
}

impl UpdateFormMetaRequest {
    /// Validate the request.
    ///
    /// Returns the trimmed name.
    pub fn validate(&self) -> Result<&str, &'static str> {
        let name = self.name.trim();

        if name.is_empty() {
            return Err("Form name must not be empty");
        }

        if name.chars().count() > MAX_FORM_NAME_LENGTH {
            return Err("Form name must be at most 255 characters");
        }

        Ok(name)
    }
}

/// Request body for `PUT /api/forms/{uuid}/affiliates`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAffiliatesRequest {
    pub affiliates: Vec<Uuid>,
}

impl UpdateAffiliatesRequest {
    /// Affiliate uuids with duplicates removed, in request order.
    pub fn unique_affiliates(&self) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        self.affiliates
            .iter()
            .copied()
            .filter(|uuid| seen.insert(*uuid))
            .collect()
    }
}

/// Pick the name for a new blank form.
///
/// Returns "Untitled form" when free, otherwise "Untitled form (N)" for the
/// smallest N >= 2 that none of `existing` uses.
pub fn untitled_form_name<'a>(existing: impl IntoIterator<Item = &'a str>) -> String {
    let mut base_taken = false;
    let mut taken = HashSet::new();

    for name in existing {
        if name == UNTITLED_FORM_NAME {
            base_taken = true;
        } else if let Some(n) = name
            .strip_prefix(UNTITLED_FORM_NAME)
            .and_then(|rest| rest.strip_prefix(" ("))
            .and_then(|rest| rest.strip_suffix(')'))
            .and_then(|n| n.parse::<u32>().ok())
        {
            taken.insert(n);
        }
    }

    if !base_taken {
        return UNTITLED_FORM_NAME.to_string();
    }

    let n = (2u32..)
        .find(|n| !taken.contains(n))
        .unwrap_or(u32::MAX);
    format!("{} ({})", UNTITLED_FORM_NAME, n)
}

// ============================================================================
// Affiliates
// ============================================================================

/// Maximum affiliate name length in characters.
pub const MAX_AFFILIATE_NAME_LENGTH: usize = 100;

/// Maximum affiliate email and company length in characters (matches the
/// column width).
pub const MAX_AFFILIATE_CONTACT_LENGTH: usize = 255;

/// Affiliate database row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AffiliateRow {
    #[serde(skip)]
    pub id: i32,

    pub uuid: Uuid,

    #[serde(skip)]
    pub user_id: i32,

    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub company: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `POST /api/affiliates`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAffiliateRequest {
    pub first_name: String,
    pub last_name: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub company: Option<String>,
}

impl CreateAffiliateRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        for name in [&self.first_name, &self.last_name] {
            let name = name.trim();
            if name.is_empty() {
                return Err("Affiliate names must not be empty");
            }
            if name.chars().count() > MAX_AFFILIATE_NAME_LENGTH {
                return Err("Affiliate names must be at most 100 characters");
            }
        }

        if let Some(email) = self.email.as_deref().map(str::trim) {
            if email.chars().count() > MAX_AFFILIATE_CONTACT_LENGTH {
                return Err("Affiliate email must be at most 255 characters");
            }
            if !email.is_empty() && !email.contains('@') {
                return Err("Affiliate email is invalid");
            }
        }

        if let Some(company) = self.company.as_deref().map(str::trim) {
            if company.chars().count() > MAX_AFFILIATE_CONTACT_LENGTH {
                return Err("Affiliate company must be at most 255 characters");
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AffiliateResponse {
    pub affiliate: AffiliateRow,
}

#[derive(Debug, Clone, Serialize)]
pub struct AffiliateListResponse {
    pub affiliates: Vec<AffiliateRow>,
}

// ============================================================================
// Submissions
// ============================================================================

/// Request body for `POST /api/submissions/{uuid}/submit`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitFormRequest {
    pub data: serde_json::Map<String, serde_json::Value>,
}

/// Stored submission, as returned to the submitter.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SubmissionReceipt {
    pub uuid: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResponse {
    pub submission: SubmissionReceipt,
}

// ============================================================================
// Path parameters
// ============================================================================

/// Parse a resource id taken from the URL path.
///
/// Accepts only the hyphenated form of an RFC 4122 uuid with version 1-7.
pub fn parse_resource_uuid(raw: &str) -> Result<Uuid, &'static str> {
    const INVALID: &str = "Invalid resource id";

    if raw.len() != 36 {
        return Err(INVALID);
    }

    let uuid = Uuid::try_parse(raw).map_err(|_| INVALID)?;

    if uuid.get_variant() != uuid::Variant::RFC4122 {
        return Err(INVALID);
    }

    match uuid.get_version_num() {
        1..=7 => Ok(uuid),
        _ => Err(INVALID),
    }
}

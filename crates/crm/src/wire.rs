//! Serde models for NeonCRM's legacy API envelopes.
//!
//! Every response nests its payload under an operation-named key and
//! reports success through `operationResult`. Search results come back
//! as flat name/value pair lists ([`RawRecord`]); those stay untyped
//! here and are interpreted by the points reconciler.

use checkin_core::points::RawRecord;
use serde::Deserialize;

pub const OPERATION_SUCCESS: &str = "SUCCESS";

/// NeonCRM error code descriptions, from the API documentation.
pub fn describe_error_code(code: &str) -> &'static str {
    match code {
        "1" => "An unknown system error. Often, these are generated due to a badly formed API request or a problem in NeonCRM.",
        "2" => "Indicates a temporary problem with NeonCRM's servers.",
        "3" => "A user session ID must be included with the request. Retrieve a session ID using the Login method.",
        "4" => "The provided user session ID is invalid.",
        "5" => "The user account associated with this API key does not have sufficient permissions to perform the desired operation.",
        _ => "No description available.",
    }
}

// ─── OAuth ──────────────────────────────────────────────────────────────────

/// Token exchange response. The access token NeonCRM returns is the
/// constituent's account id.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub error: Option<String>,
}

// ─── API Login ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginEnvelope {
    #[serde(rename = "loginResponse")]
    pub login_response: LoginResponse,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "operationResult")]
    pub operation_result: String,
    #[serde(rename = "responseMessage")]
    pub response_message: Option<String>,
    #[serde(rename = "userSessionId")]
    pub user_session_id: Option<String>,
    pub errors: Option<ErrorList>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorList {
    pub error: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    /// Arrives as a number or a string depending on the endpoint.
    #[serde(rename = "errorCode")]
    pub error_code: serde_json::Value,
    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,
}

impl ApiError {
    pub fn code(&self) -> String {
        match &self.error_code {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

// ─── Account Retrieval ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RetrieveAccountEnvelope {
    #[serde(rename = "retrieveIndividualAccountResponse")]
    pub response: RetrieveAccountResponse,
}

#[derive(Debug, Deserialize)]
pub struct RetrieveAccountResponse {
    #[serde(rename = "operationResult")]
    pub operation_result: String,
    #[serde(rename = "individualAccount")]
    pub individual_account: Option<IndividualAccount>,
    pub errors: Option<ErrorList>,
}

#[derive(Debug, Deserialize)]
pub struct IndividualAccount {
    #[serde(rename = "primaryContact")]
    pub primary_contact: PrimaryContact,
}

#[derive(Debug, Deserialize)]
pub struct PrimaryContact {
    #[serde(rename = "preferredName")]
    pub preferred_name: Option<String>,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
}

impl PrimaryContact {
    /// Preferred name when set, first name otherwise.
    pub fn display_name(&self) -> Option<&str> {
        self.preferred_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.first_name.as_deref())
    }
}

// ─── Custom Object Records ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListRecordsEnvelope {
    #[serde(rename = "listCustomObjectRecordsResponse")]
    pub response: ListRecordsResponse,
}

#[derive(Debug, Deserialize)]
pub struct ListRecordsResponse {
    #[serde(rename = "operationResult")]
    pub operation_result: String,
    #[serde(rename = "searchResults")]
    pub search_results: Option<SearchResults>,
    pub errors: Option<ErrorList>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResults {
    /// Absent entirely when the constituent has no records yet.
    #[serde(rename = "nameValuePairs", default)]
    pub name_value_pairs: Vec<RawRecord>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecordEnvelope {
    #[serde(rename = "createCustomObjectRecordResponse")]
    pub response: CreateRecordResponse,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecordResponse {
    #[serde(rename = "operationResult")]
    pub operation_result: String,
    pub errors: Option<ErrorList>,
}

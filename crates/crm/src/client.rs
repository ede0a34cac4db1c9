//! NeonCRM API client.
//!
//! Owns all outbound HTTP: OAuth code exchange, API-user login, account
//! retrieval, and custom-object record search/creation. Callers pass the
//! CRM user session id explicitly; nothing here touches ambient session
//! state, and nothing downstream of this client sees a non-200 response.

use checkin_core::config::CrmConfig;
use checkin_core::error::{CheckinError, CheckinResult};
use checkin_core::points::{RawRecord, CHECKIN_TYPE, DATA_UPDATE_TYPE};
use checkin_core::types::Constituent;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::endpoints::CrmEndpoints;
use crate::wire::*;

/// Date format used in the human-readable names of created records,
/// e.g. `check-in: Tulsa Web Devs - 03/14/24`.
const RECORD_NAME_DATE_FORMAT: &str = "%m/%d/%y";

/// Output columns requested for Points_c record searches. Label/column
/// pairs mirror the CRM's custom-object field configuration.
const POINTS_OUTPUT_FIELDS: &[(&str, &str)] = &[
    ("Points Activity", "name"),
    ("Created on", "createTime"),
    ("point_type", "point_type_c"),
    ("point_subtype", "point_subtype_c"),
    ("Points Awarded", "Points_Awarded_c"),
];

/// Output columns requested for Incentives_c record searches.
const INCENTIVE_OUTPUT_FIELDS: &[(&str, &str)] = &[
    ("Incentive", "name"),
    ("Points Needed", "Points_Needed_c"),
];

pub struct CrmClient {
    http: reqwest::Client,
    endpoints: CrmEndpoints,
    config: CrmConfig,
}

impl CrmClient {
    pub fn new(config: &CrmConfig) -> CheckinResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| CheckinError::Transport(e.to_string()))?;

        info!(
            api_base_url = %config.api_base_url,
            org_id = %config.org_id,
            "CRM client initialized"
        );

        Ok(Self {
            http,
            endpoints: CrmEndpoints::new(config),
            config: config.clone(),
        })
    }

    /// OAuth authorization URL the landing page sends the constituent to.
    pub fn oauth_login_url(&self) -> CheckinResult<String> {
        let url = url::Url::parse_with_params(
            &self.endpoints.oauth_login,
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ],
        )
        .map_err(|e| CheckinError::Config(format!("bad OAuth login URL: {e}")))?;
        Ok(url.into())
    }

    /// Exchange an OAuth authorization code for the constituent's account
    /// id (NeonCRM returns it as the access token).
    pub async fn exchange_code(&self, code: &str) -> CheckinResult<String> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(&self.endpoints.oauth_token)
            .form(&params)
            .send()
            .await
            .map_err(|e| CheckinError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            metrics::counter!("crm.oauth_errors").increment(1);
            return Err(CheckinError::OAuth(format!(
                "token exchange returned status {status}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CheckinError::Transport(e.to_string()))?;
        match token.access_token {
            Some(account_id) if !account_id.is_empty() => {
                debug!("OAuth code exchanged");
                Ok(account_id)
            }
            _ => {
                metrics::counter!("crm.oauth_errors").increment(1);
                Err(CheckinError::OAuth(format!(
                    "no access token in exchange response: {}",
                    token.error.unwrap_or_else(|| "unspecified".to_string())
                )))
            }
        }
    }

    /// Log in as the API user. The returned user session id is valid for
    /// ten minutes server-side.
    pub async fn api_login(&self) -> CheckinResult<String> {
        let body = self
            .get_json(
                &self.endpoints.api_login,
                &[
                    ("login.apiKey", self.config.api_key.clone()),
                    ("login.orgid", self.config.org_id.clone()),
                ],
            )
            .await?;
        let envelope: LoginEnvelope = serde_json::from_value(body)?;
        let login = envelope.login_response;

        check_operation(&login.operation_result, login.errors.as_ref(), "api login")?;

        match login.user_session_id {
            Some(usid) if !usid.is_empty() => {
                info!("CRM API login succeeded");
                Ok(usid)
            }
            _ => Err(CheckinError::Crm(format!(
                "login succeeded but no user session id received: {}",
                login.response_message.unwrap_or_default()
            ))),
        }
    }

    /// Fetch the constituent's account and pick a display name.
    pub async fn retrieve_constituent(
        &self,
        user_session_id: &str,
        account_id: &str,
    ) -> CheckinResult<Constituent> {
        let body = self
            .get_json(
                &self.endpoints.retrieve_account,
                &[
                    ("userSessionId", user_session_id.to_string()),
                    ("accountId", account_id.to_string()),
                ],
            )
            .await?;
        let envelope: RetrieveAccountEnvelope = serde_json::from_value(body)?;
        let account = envelope.response;

        check_operation(
            &account.operation_result,
            account.errors.as_ref(),
            "retrieve account",
        )?;

        let contact = account
            .individual_account
            .ok_or_else(|| CheckinError::Crm("no individual account in response".to_string()))?
            .primary_contact;
        let display_name = contact
            .display_name()
            .unwrap_or("Constituent")
            .to_string();

        debug!(name = %display_name, "Constituent retrieved");
        Ok(Constituent {
            account_id: account_id.to_string(),
            display_name,
        })
    }

    /// List all Points_c records for a constituent, untyped.
    pub async fn list_point_records(
        &self,
        user_session_id: &str,
        account_id: &str,
    ) -> CheckinResult<Vec<RawRecord>> {
        self.list_records(user_session_id, "Points_c", Some(account_id), POINTS_OUTPUT_FIELDS)
            .await
    }

    /// List the incentive catalog, untyped. Incentives are org-wide, so
    /// no constituent criteria apply.
    pub async fn list_incentives(&self, user_session_id: &str) -> CheckinResult<Vec<RawRecord>> {
        self.list_records(user_session_id, "Incentives_c", None, INCENTIVE_OUTPUT_FIELDS)
            .await
    }

    async fn list_records(
        &self,
        user_session_id: &str,
        object_api_name: &str,
        constituent: Option<&str>,
        output_fields: &[(&str, &str)],
    ) -> CheckinResult<Vec<RawRecord>> {
        let mut params: Vec<(&str, String)> = vec![
            ("userSessionId", user_session_id.to_string()),
            ("objectApiName", object_api_name.to_string()),
            ("page.pageSize", self.config.page_size.to_string()),
        ];
        if let Some(account_id) = constituent {
            params.extend([
                (
                    "customObjectSearchCriteriaList.customObjectSearchCriteria.criteriaField",
                    "Constituent_c".to_string(),
                ),
                (
                    "customObjectSearchCriteriaList.customObjectSearchCriteria.operator",
                    "EQUAL".to_string(),
                ),
                (
                    "customObjectSearchCriteriaList.customObjectSearchCriteria.value",
                    account_id.to_string(),
                ),
            ]);
        }
        for (label, column) in output_fields {
            params.push((
                "customObjectOutputFieldList.customObjectOutputField.label",
                label.to_string(),
            ));
            params.push((
                "customObjectOutputFieldList.customObjectOutputField.columnName",
                column.to_string(),
            ));
        }

        let body = self.get_json(&self.endpoints.list_records, &params).await?;
        let envelope: ListRecordsEnvelope = serde_json::from_value(body)?;
        let list = envelope.response;

        check_operation(&list.operation_result, list.errors.as_ref(), "list records")?;

        let records = list
            .search_results
            .map(|r| r.name_value_pairs)
            .unwrap_or_default();
        debug!(
            object = object_api_name,
            count = records.len(),
            "CRM records listed"
        );
        Ok(records)
    }

    /// Create a Points_c record for today's event check-in.
    pub async fn create_checkin_record(
        &self,
        user_session_id: &str,
        account_id: &str,
        group: &str,
        today: NaiveDate,
    ) -> CheckinResult<()> {
        let record_name = format!(
            "check-in: {group} - {}",
            today.format(RECORD_NAME_DATE_FORMAT)
        );
        self.create_record(
            user_session_id,
            "Points_c",
            &[
                ("Constituent_c", account_id),
                ("point_type_c", CHECKIN_TYPE),
                ("point_subtype_c", group),
                ("name", &record_name),
            ],
        )
        .await?;

        metrics::counter!("crm.checkins_created").increment(1);
        info!(group, "Check-in record created");
        Ok(())
    }

    /// Create the Points_c record for a data update, then the
    /// Data_Update_c record carrying the submitted value itself.
    pub async fn create_data_update_records(
        &self,
        user_session_id: &str,
        account_id: &str,
        kind: &str,
        value: &str,
        today: NaiveDate,
    ) -> CheckinResult<()> {
        let record_name = format!(
            "data update: {kind} - {}",
            today.format(RECORD_NAME_DATE_FORMAT)
        );
        self.create_record(
            user_session_id,
            "Points_c",
            &[
                ("Constituent_c", account_id),
                ("point_type_c", DATA_UPDATE_TYPE),
                ("point_subtype_c", kind),
                ("name", &record_name),
            ],
        )
        .await?;

        self.create_record(
            user_session_id,
            "Data_Update_c",
            &[
                ("Constituent_c", account_id),
                ("update_kind_c", kind),
                ("update_value_c", value),
                ("name", &record_name),
            ],
        )
        .await?;

        metrics::counter!("crm.data_updates_created").increment(1);
        info!(kind, "Data-update records created");
        Ok(())
    }

    async fn create_record(
        &self,
        user_session_id: &str,
        object_api_name: &str,
        data: &[(&str, &str)],
    ) -> CheckinResult<()> {
        let mut params: Vec<(&str, String)> = vec![
            ("userSessionId", user_session_id.to_string()),
            (
                "customObjectRecord.objectApiName",
                object_api_name.to_string(),
            ),
        ];
        for (name, value) in data {
            params.push((
                "customObjectRecord.customObjectRecordDataList.customObjectRecordData.name",
                name.to_string(),
            ));
            params.push((
                "customObjectRecord.customObjectRecordDataList.customObjectRecordData.value",
                value.to_string(),
            ));
        }

        let response = self
            .http
            .post(&self.endpoints.create_record)
            .query(&params)
            .send()
            .await
            .map_err(|e| CheckinError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            metrics::counter!("crm.errors").increment(1);
            return Err(CheckinError::Crm(format!(
                "create {object_api_name} record returned status {status}"
            )));
        }

        let envelope: CreateRecordEnvelope = response
            .json()
            .await
            .map_err(|e| CheckinError::Transport(e.to_string()))?;
        check_operation(
            &envelope.response.operation_result,
            envelope.response.errors.as_ref(),
            "create record",
        )
    }

    async fn get_json(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> CheckinResult<serde_json::Value> {
        metrics::counter!("crm.requests").increment(1);
        let response = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| CheckinError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            metrics::counter!("crm.errors").increment(1);
            return Err(CheckinError::Crm(format!(
                "CRM returned status {status} for {url}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| CheckinError::Transport(e.to_string()))
    }
}

/// Fail with a descriptive error when an envelope reports anything but
/// SUCCESS, logging each CRM-provided error with its documented meaning.
fn check_operation(
    operation_result: &str,
    errors: Option<&ErrorList>,
    context: &str,
) -> CheckinResult<()> {
    if operation_result == OPERATION_SUCCESS {
        return Ok(());
    }

    metrics::counter!("crm.operation_failures").increment(1);
    let mut details = Vec::new();
    if let Some(list) = errors {
        for error in &list.error {
            let code = error.code();
            warn!(
                code = %code,
                message = error.error_message.as_deref().unwrap_or(""),
                description = describe_error_code(&code),
                "CRM reported an error"
            );
            details.push(format!(
                "code {code}: {}",
                error.error_message.as_deref().unwrap_or("no message")
            ));
        }
    }

    Err(CheckinError::Crm(format!(
        "{context} failed with result {operation_result}{}",
        if details.is_empty() {
            String::new()
        } else {
            format!(" ({})", details.join("; "))
        }
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::ErrorList;

    #[test]
    fn test_oauth_login_url() {
        let mut config = CrmConfig::default();
        config.org_id = "techlahoma".to_string();
        config.client_id = "client-123".to_string();
        config.redirect_uri = "https://check.example.org/authorize".to_string();
        let client = CrmClient::new(&config).unwrap();

        let url = client.oauth_login_url().unwrap();
        assert!(url.starts_with("https://techlahoma.app.neoncrm.com/np/oauth/auth?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=client-123"));
        // The redirect URI must be query-encoded.
        assert!(url.contains("redirect_uri=https%3A%2F%2Fcheck.example.org%2Fauthorize"));
    }

    #[test]
    fn test_check_operation_success() {
        assert!(check_operation("SUCCESS", None, "api login").is_ok());
    }

    #[test]
    fn test_check_operation_failure_includes_codes() {
        let errors: ErrorList = serde_json::from_value(serde_json::json!({
            "error": [
                { "errorCode": "5", "errorMessage": "Insufficient permissions" }
            ]
        }))
        .unwrap();

        let err = check_operation("FAIL", Some(&errors), "api login").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("api login failed"));
        assert!(message.contains("code 5"));
        assert!(message.contains("Insufficient permissions"));
    }
}

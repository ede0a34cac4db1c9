//! Catalog of NeonCRM endpoint URLs, built once from configuration.
//!
//! NeonCRM's legacy API addresses everything through query parameters,
//! including the repeated `customObjectRecordData` name/value pairs used
//! to create records. The catalog owns the paths; the client owns the
//! query assembly.

use checkin_core::config::CrmConfig;

#[derive(Debug, Clone)]
pub struct CrmEndpoints {
    /// OAuth authorization page shown to the constituent.
    pub oauth_login: String,
    /// OAuth code-for-token exchange.
    pub oauth_token: String,
    /// API-user login yielding a ten-minute `userSessionId`.
    pub api_login: String,
    /// Individual account retrieval.
    pub retrieve_account: String,
    /// Custom-object record search (points, incentives).
    pub list_records: String,
    /// Custom-object record creation (check-ins, data updates).
    pub create_record: String,
}

impl CrmEndpoints {
    pub fn new(config: &CrmConfig) -> Self {
        let api = config.api_base_url.trim_end_matches('/');
        Self {
            oauth_login: format!(
                "https://{}.{}/np/oauth/auth",
                config.org_id, config.app_domain
            ),
            oauth_token: format!("https://{}/np/oauth/token", config.app_domain),
            api_login: format!("{api}/neonws/services/api/common/login"),
            retrieve_account: format!(
                "{api}/neonws/services/api/account/retrieveIndividualAccount"
            ),
            list_records: format!(
                "{api}/neonws/services/api/customObjectRecord/listCustomObjectRecords"
            ),
            create_record: format!(
                "{api}/neonws/services/api/customObjectRecord/createCustomObjectRecord"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_from_config() {
        let mut config = CrmConfig::default();
        config.org_id = "techlahoma".to_string();
        let endpoints = CrmEndpoints::new(&config);

        assert_eq!(
            endpoints.oauth_login,
            "https://techlahoma.app.neoncrm.com/np/oauth/auth"
        );
        assert_eq!(
            endpoints.oauth_token,
            "https://app.neoncrm.com/np/oauth/token"
        );
        assert!(endpoints
            .list_records
            .starts_with("https://api.neoncrm.com/neonws/"));
    }
}

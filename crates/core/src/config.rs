use serde::Deserialize;
use std::collections::HashMap;

/// Root application configuration. Loaded from environment variables
/// with the prefix `CHECKLAHOMA__` and optional TOML config files.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub crm: CrmConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub points: PointsConfig,
    #[serde(default)]
    pub checkin: CheckinGroupsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// NeonCRM credentials and endpoints. The credential fields have no
/// sensible defaults and must come from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct CrmConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_app_domain")]
    pub app_domain: String,
    #[serde(default)]
    pub org_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a server-side session is dropped.
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
    /// CRM user session ids expire server-side after ten minutes; we
    /// renew slightly earlier than that.
    #[serde(default = "default_usid_ttl_secs")]
    pub usid_ttl_secs: u64,
}

/// Points reconciliation configuration: the data-update subtype catalog
/// and the point values submitting each kind is worth.
#[derive(Debug, Clone, Deserialize)]
pub struct PointsConfig {
    #[serde(default = "default_data_update_kinds")]
    pub data_update_kinds: Vec<String>,
    #[serde(default = "default_data_update_points")]
    pub default_data_update_points: u32,
    #[serde(default)]
    pub data_update_points: HashMap<String, u32>,
}

impl PointsConfig {
    /// Point value awarded for submitting a given data-update kind.
    pub fn points_for_kind(&self, kind: &str) -> u32 {
        self.data_update_points
            .get(kind)
            .copied()
            .unwrap_or(self.default_data_update_points)
    }
}

/// Catalog of community groups a constituent can check in to.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckinGroupsConfig {
    #[serde(default = "default_groups")]
    pub groups: Vec<String>,
}

// Default functions
fn default_node_id() -> String {
    "checkin-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_api_base_url() -> String {
    "https://api.neoncrm.com".to_string()
}
fn default_app_domain() -> String {
    "app.neoncrm.com".to_string()
}
fn default_page_size() -> u32 {
    200
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_session_ttl_secs() -> u64 {
    3600
}
fn default_usid_ttl_secs() -> u64 {
    540
}
fn default_data_update_kinds() -> Vec<String> {
    vec!["linkedin".to_string()]
}
fn default_data_update_points() -> u32 {
    10
}
fn default_groups() -> Vec<String> {
    [
        "Atlas Demo Day",
        "SheCodesTulsa",
        "Tulsa Web Devs",
        "Tulsa UX",
        "Tulsa Game Developers",
        "Tulsa Developers Association",
        "Tulsa Agile Practitioners",
        "Tulsa Area Techlahoma",
        "OKC-Sharp",
        "OKC LUGnuts",
        "Oklahoma Game Developers",
        "Oklahoma City Java Users",
        "Oklahoma City Techlahoma",
        "UX Connect OKC",
        "OKC WebDevs",
        "OKC Open Source Hardware",
        "Pythonistas",
        "Salesforce Meetup Group",
        "SheCodesOKC",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            app_domain: default_app_domain(),
            org_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            api_key: String::new(),
            redirect_uri: String::new(),
            page_size: default_page_size(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
            usid_ttl_secs: default_usid_ttl_secs(),
        }
    }
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            data_update_kinds: default_data_update_kinds(),
            default_data_update_points: default_data_update_points(),
            data_update_points: HashMap::new(),
        }
    }
}

impl Default for CheckinGroupsConfig {
    fn default() -> Self {
        Self {
            groups: default_groups(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            crm: CrmConfig::default(),
            session: SessionConfig::default(),
            points: PointsConfig::default(),
            checkin: CheckinGroupsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and optional config file.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("CHECKLAHOMA")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api.http_port, 8080);
        assert_eq!(config.crm.page_size, 200);
        assert_eq!(config.points.data_update_kinds, vec!["linkedin"]);
        assert!(config.checkin.groups.contains(&"Tulsa Web Devs".to_string()));
    }

    #[test]
    fn test_points_for_kind_override() {
        let mut config = PointsConfig::default();
        config.data_update_points.insert("linkedin".to_string(), 25);
        assert_eq!(config.points_for_kind("linkedin"), 25);
        assert_eq!(config.points_for_kind("github"), 10);
    }
}

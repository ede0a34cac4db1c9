use thiserror::Error;

pub type CheckinResult<T> = Result<T, CheckinError>;

#[derive(Error, Debug)]
pub enum CheckinError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CRM transport error: {0}")]
    Transport(String),

    #[error("CRM API error: {0}")]
    Crm(String),

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Record parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

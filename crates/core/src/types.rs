//! Shared domain types.

use serde::{Deserialize, Serialize};

/// A CRM-tracked individual: the end user of the check-in app. The
/// account id doubles as the OAuth access token NeonCRM hands back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constituent {
    pub account_id: String,
    /// Preferred name when the CRM has one, first name otherwise.
    pub display_name: String,
}

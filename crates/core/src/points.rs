//! Points domain types — point-award events, incentive tiers, and the
//! reconciled summary the dashboard renders.
//!
//! Point records live in the CRM as custom objects and arrive as flat
//! name/value pair lists; [`RawRecord`] is that untyped shape. The typed
//! forms are produced by the reconciler in `checkin-points`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// CRM `point_type_c` value for event attendance records.
pub const CHECKIN_TYPE: &str = "check-in";

/// CRM `point_type_c` value for profile data submission records.
pub const DATA_UPDATE_TYPE: &str = "data-update";

/// Source format of the CRM `createTime` column.
pub const CRM_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

// ─── Wire Shape ─────────────────────────────────────────────────────────────

/// One untyped CRM custom-object record: a flat list of column/value pairs,
/// exactly as the `listCustomObjectRecords` endpoint returns them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "nameValuePair")]
    pub fields: Vec<RawField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawField {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl RawRecord {
    /// Value of the first field with the given column name, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .and_then(|f| f.value.as_deref())
    }
}

// ─── Typed Domain ───────────────────────────────────────────────────────────

/// A single point-award event, parsed from a CRM record. Immutable once
/// constructed; dates are normalized to date-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointEvent {
    pub event_type: String,
    pub subtype: String,
    pub awarded: u32,
    pub date: NaiveDate,
}

/// A reward unlocked once a points threshold is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncentiveTier {
    pub points_needed: u32,
    pub name: String,
}

/// Derived summary of a constituent's points standing, consumed by the
/// presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub total_points: u32,
    /// All parsed events, descending by date; ties keep input order.
    pub events: Vec<PointEvent>,
    /// Names of every tier already reached, ascending by threshold.
    pub earned_rewards: Vec<String>,
    /// The lowest unearned tier, if one exists.
    pub next_reward: Option<String>,
    pub points_to_next_reward: Option<u32>,
    /// Threshold of the next unearned tier, or of the highest tier when
    /// everything is earned. Unset only when no tiers are configured.
    pub next_reward_threshold: Option<u32>,
    pub eligible_for_checkin: bool,
    pub eligible_for_data_update: bool,
    /// Suggested next data-update kind from the configured catalog.
    pub next_data_update_kind: Option<String>,
    pub next_data_update_value: Option<u32>,
}

//! Core points engine: turns raw CRM point records and the incentive
//! catalog into the reconciled summary the dashboard shows.

use checkin_core::config::PointsConfig;
use checkin_core::points::*;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

/// Points reconciler — stateless, pure computation over CRM record data.
/// "Today" is always caller-supplied so results are reproducible.
pub struct PointsReconciler {
    config: PointsConfig,
}

impl PointsReconciler {
    pub fn new(config: &PointsConfig) -> Self {
        info!(
            data_update_kinds = config.data_update_kinds.len(),
            default_points = config.default_data_update_points,
            "Points reconciler initialized"
        );
        Self {
            config: config.clone(),
        }
    }

    /// Parse raw point records into typed events. A record with a
    /// malformed or missing `createTime` is skipped with a warning; one
    /// bad CRM row must never blank a constituent's whole dashboard.
    pub fn parse_events(&self, raw: &[RawRecord]) -> Vec<PointEvent> {
        let mut events = Vec::with_capacity(raw.len());

        for record in raw {
            let date = match record.get("createTime") {
                Some(ts) => match NaiveDate::parse_from_str(ts, CRM_TIMESTAMP_FORMAT) {
                    Ok(date) => date,
                    Err(e) => {
                        warn!(value = ts, error = %e, "Skipping point record with malformed createTime");
                        metrics::counter!("points.records_skipped").increment(1);
                        continue;
                    }
                },
                None => {
                    warn!("Skipping point record with no createTime");
                    metrics::counter!("points.records_skipped").increment(1);
                    continue;
                }
            };

            let awarded = match record.get("Points_Awarded_c") {
                Some(v) => match v.trim().parse::<u32>() {
                    Ok(points) => points,
                    Err(e) => {
                        warn!(value = v, error = %e, "Unreadable Points_Awarded_c, counting as 0");
                        metrics::counter!("points.awards_defaulted").increment(1);
                        0
                    }
                },
                None => {
                    warn!("Point record missing Points_Awarded_c, counting as 0");
                    metrics::counter!("points.awards_defaulted").increment(1);
                    0
                }
            };

            events.push(PointEvent {
                event_type: record.get("point_type_c").unwrap_or_default().to_string(),
                subtype: record.get("point_subtype_c").unwrap_or_default().to_string(),
                awarded,
                date,
            });
        }

        events
    }

    /// Parse raw incentive records into tiers, skipping rows with an
    /// unreadable threshold.
    pub fn parse_tiers(&self, raw: &[RawRecord]) -> Vec<IncentiveTier> {
        let mut tiers = Vec::with_capacity(raw.len());

        for record in raw {
            let name = match record.get("name") {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => {
                    warn!("Skipping incentive record with no name");
                    metrics::counter!("points.tiers_skipped").increment(1);
                    continue;
                }
            };
            let points_needed = match record.get("Points_Needed_c").and_then(|v| v.trim().parse::<u32>().ok()) {
                Some(points) => points,
                None => {
                    warn!(tier = %name, "Skipping incentive record with unreadable Points_Needed_c");
                    metrics::counter!("points.tiers_skipped").increment(1);
                    continue;
                }
            };
            tiers.push(IncentiveTier { points_needed, name });
        }

        tiers
    }

    /// One full reconciliation pass. Pure function of its inputs: no I/O,
    /// no clock reads, no state carried across calls.
    pub fn reconcile(
        &self,
        raw_events: &[RawRecord],
        raw_tiers: &[RawRecord],
        today: NaiveDate,
    ) -> ReconciliationResult {
        let mut events = self.parse_events(raw_events);
        let tiers = self.parse_tiers(raw_tiers);

        // Summed before sorting; addition commutes, so order is unobservable.
        let total_points: u32 = events.iter().map(|e| e.awarded).sum();

        // Stable: same-day events keep their CRM input order.
        events.sort_by(|a, b| b.date.cmp(&a.date));

        let eligible_for_checkin = !events
            .iter()
            .any(|e| e.event_type == CHECKIN_TYPE && e.date == today);
        let mut eligible_for_data_update = !events
            .iter()
            .any(|e| e.event_type == DATA_UPDATE_TYPE && e.date == today);

        let (earned_rewards, next_reward, points_to_next_reward, next_reward_threshold) =
            walk_tiers(&tiers, total_points);

        // Kinds already submitted drop out of the candidate set. The
        // suggestion is the first remaining catalog entry; anything
        // fancier (randomized nudges) belongs in the presentation layer.
        let mut remaining: Vec<&str> = self.config.data_update_kinds.iter().map(String::as_str).collect();
        for event in events.iter().filter(|e| e.event_type == DATA_UPDATE_TYPE) {
            remaining.retain(|kind| *kind != event.subtype);
        }
        let (next_data_update_kind, next_data_update_value) = match remaining.first() {
            Some(kind) => (
                Some(kind.to_string()),
                Some(self.config.points_for_kind(kind)),
            ),
            None => {
                eligible_for_data_update = false;
                (None, None)
            }
        };

        metrics::counter!("points.reconciliations").increment(1);

        debug!(
            total_points,
            events = events.len(),
            earned = earned_rewards.len(),
            eligible_for_checkin,
            eligible_for_data_update,
            "Points reconciled"
        );

        ReconciliationResult {
            total_points,
            events,
            earned_rewards,
            next_reward,
            points_to_next_reward,
            next_reward_threshold,
            eligible_for_checkin,
            eligible_for_data_update,
            next_data_update_kind,
            next_data_update_value,
        }
    }

    pub fn config(&self) -> &PointsConfig {
        &self.config
    }
}

/// Walk tiers ascending, collecting earned reward names until the first
/// unmet threshold. Returns (earned, next, points_to_next, threshold).
fn walk_tiers(
    tiers: &[IncentiveTier],
    total_points: u32,
) -> (Vec<String>, Option<String>, Option<u32>, Option<u32>) {
    let mut sorted: Vec<&IncentiveTier> = tiers.iter().collect();
    sorted.sort_by_key(|t| t.points_needed);

    let mut earned = Vec::new();
    for tier in &sorted {
        if tier.points_needed <= total_points {
            earned.push(tier.name.clone());
        } else {
            // Minimal-next-unmet-tier policy: later tiers are not evaluated.
            return (
                earned,
                Some(tier.name.clone()),
                Some(tier.points_needed - total_points),
                Some(tier.points_needed),
            );
        }
    }

    // Every tier earned, or none configured at all. The caller must treat
    // a missing threshold as "no incentives configured".
    let threshold = sorted.last().map(|t| t.points_needed);
    (earned, None, None, threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> PointsConfig {
        PointsConfig::default()
    }

    fn raw(fields: &[(&str, Option<&str>)]) -> RawRecord {
        RawRecord {
            fields: fields
                .iter()
                .map(|(name, value)| RawField {
                    name: name.to_string(),
                    value: value.map(|v| v.to_string()),
                })
                .collect(),
        }
    }

    fn raw_event(event_type: &str, subtype: &str, awarded: &str, created: &str) -> RawRecord {
        raw(&[
            ("point_type_c", Some(event_type)),
            ("point_subtype_c", Some(subtype)),
            ("Points_Awarded_c", Some(awarded)),
            ("createTime", Some(created)),
        ])
    }

    fn raw_tier(points_needed: &str, name: &str) -> RawRecord {
        raw(&[
            ("Points_Needed_c", Some(points_needed)),
            ("name", Some(name)),
        ])
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 20).unwrap()
    }

    #[test]
    fn test_total_is_order_independent() {
        let reconciler = PointsReconciler::new(&test_config());
        let a = raw_event("check-in", "Tulsa Web Devs", "5", "03/01/2024 18:00:00");
        let b = raw_event("check-in", "Tulsa UX", "7", "02/01/2024 18:00:00");
        let c = raw_event("data-update", "linkedin", "10", "01/15/2024 09:00:00");

        let forward = reconciler.reconcile(&[a.clone(), b.clone(), c.clone()], &[], today());
        let backward = reconciler.reconcile(&[c, b, a], &[], today());
        assert_eq!(forward.total_points, 22);
        assert_eq!(backward.total_points, 22);
    }

    #[test]
    fn test_events_sorted_descending_stable() {
        let reconciler = PointsReconciler::new(&test_config());
        let raw_events = vec![
            raw_event("check-in", "first-of-day", "1", "03/05/2024 08:00:00"),
            raw_event("check-in", "older", "1", "03/01/2024 08:00:00"),
            raw_event("check-in", "second-of-day", "1", "03/05/2024 19:00:00"),
        ];

        let result = reconciler.reconcile(&raw_events, &[], today());
        let subtypes: Vec<&str> = result.events.iter().map(|e| e.subtype.as_str()).collect();
        // Same-day records keep input order; time-of-day is discarded.
        assert_eq!(subtypes, vec!["first-of-day", "second-of-day", "older"]);
    }

    #[test]
    fn test_empty_and_single_event_lists() {
        let reconciler = PointsReconciler::new(&test_config());
        let empty = reconciler.reconcile(&[], &[], today());
        assert_eq!(empty.total_points, 0);
        assert!(empty.events.is_empty());
        assert!(empty.eligible_for_checkin);

        let one = reconciler.reconcile(
            &[raw_event("check-in", "solo", "3", "03/01/2024 12:00:00")],
            &[],
            today(),
        );
        assert_eq!(one.events.len(), 1);
        assert_eq!(one.total_points, 3);
    }

    #[test]
    fn test_no_points_yet() {
        let reconciler = PointsReconciler::new(&test_config());
        let tiers = vec![raw_tier("10", "A"), raw_tier("50", "B")];

        let result = reconciler.reconcile(&[], &tiers, today());
        assert!(result.earned_rewards.is_empty());
        assert_eq!(result.next_reward.as_deref(), Some("A"));
        assert_eq!(result.points_to_next_reward, Some(10));
        assert_eq!(result.next_reward_threshold, Some(10));
    }

    #[test]
    fn test_all_tiers_earned() {
        let reconciler = PointsReconciler::new(&test_config());
        let raw_events = vec![raw_event("check-in", "big day", "60", "03/01/2024 12:00:00")];
        let tiers = vec![raw_tier("10", "A"), raw_tier("50", "B")];

        let result = reconciler.reconcile(&raw_events, &tiers, today());
        assert_eq!(result.earned_rewards, vec!["A", "B"]);
        assert_eq!(result.next_reward, None);
        assert_eq!(result.points_to_next_reward, None);
        assert_eq!(result.next_reward_threshold, Some(50));
    }

    #[test]
    fn test_partial_earned_stops_at_first_unmet() {
        let reconciler = PointsReconciler::new(&test_config());
        let raw_events = vec![raw_event("check-in", "x", "15", "03/01/2024 12:00:00")];
        // Unsorted on purpose; the walk sorts ascending first.
        let tiers = vec![raw_tier("100", "C"), raw_tier("10", "A"), raw_tier("50", "B")];

        let result = reconciler.reconcile(&raw_events, &tiers, today());
        assert_eq!(result.earned_rewards, vec!["A"]);
        assert_eq!(result.next_reward.as_deref(), Some("B"));
        assert_eq!(result.points_to_next_reward, Some(35));
        assert_eq!(result.next_reward_threshold, Some(50));
    }

    #[test]
    fn test_empty_tier_catalog_is_distinct_from_all_earned() {
        let reconciler = PointsReconciler::new(&test_config());
        let result = reconciler.reconcile(&[], &[], today());
        assert!(result.earned_rewards.is_empty());
        assert_eq!(result.next_reward, None);
        assert_eq!(result.next_reward_threshold, None);
    }

    #[test]
    fn test_checkin_today_blocks_eligibility() {
        let reconciler = PointsReconciler::new(&test_config());
        let raw_events = vec![raw_event("check-in", "Tulsa UX", "5", "03/20/2024 18:30:00")];

        let result = reconciler.reconcile(&raw_events, &[], today());
        assert!(!result.eligible_for_checkin);
        // A check-in does not consume data-update eligibility.
        assert!(result.eligible_for_data_update);

        let yesterday = reconciler.reconcile(
            &[raw_event("check-in", "Tulsa UX", "5", "03/19/2024 18:30:00")],
            &[],
            today(),
        );
        assert!(yesterday.eligible_for_checkin);
    }

    #[test]
    fn test_data_update_today_blocks_eligibility() {
        let mut config = test_config();
        config.data_update_kinds.push("github".to_string());
        let reconciler = PointsReconciler::new(&config);

        let raw_events = vec![raw_event("data-update", "github", "10", "03/20/2024 09:00:00")];
        let result = reconciler.reconcile(&raw_events, &[], today());
        assert!(!result.eligible_for_data_update);
        // The other kind is still the suggestion once a day has passed.
        assert_eq!(result.next_data_update_kind.as_deref(), Some("linkedin"));
    }

    #[test]
    fn test_exhausted_catalog_forces_ineligible() {
        // Default catalog is just {"linkedin"}.
        let reconciler = PointsReconciler::new(&test_config());
        let raw_events = vec![raw_event("data-update", "linkedin", "10", "01/15/2024 09:00:00")];

        let result = reconciler.reconcile(&raw_events, &[], today());
        assert!(!result.eligible_for_data_update);
        assert_eq!(result.next_data_update_kind, None);
        assert_eq!(result.next_data_update_value, None);
    }

    #[test]
    fn test_next_data_update_is_first_remaining() {
        let mut config = test_config();
        config.data_update_kinds = vec!["linkedin".to_string(), "github".to_string()];
        config.data_update_points.insert("github".to_string(), 15);
        let reconciler = PointsReconciler::new(&config);

        let fresh = reconciler.reconcile(&[], &[], today());
        assert_eq!(fresh.next_data_update_kind.as_deref(), Some("linkedin"));
        assert_eq!(fresh.next_data_update_value, Some(10));

        let after_linkedin = reconciler.reconcile(
            &[raw_event("data-update", "linkedin", "10", "01/15/2024 09:00:00")],
            &[],
            today(),
        );
        assert_eq!(after_linkedin.next_data_update_kind.as_deref(), Some("github"));
        assert_eq!(after_linkedin.next_data_update_value, Some(15));
    }

    #[test]
    fn test_malformed_date_skips_record_only() {
        let reconciler = PointsReconciler::new(&test_config());
        let raw_events = vec![
            raw_event("check-in", "good", "5", "03/01/2024 12:00:00"),
            raw_event("check-in", "bad", "5", "not a date"),
            raw(&[("point_type_c", Some("check-in"))]),
        ];

        let result = reconciler.reconcile(&raw_events, &[], today());
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.total_points, 5);
    }

    #[test]
    fn test_missing_awarded_counts_as_zero() {
        let reconciler = PointsReconciler::new(&test_config());
        let raw_events = vec![
            raw(&[
                ("point_type_c", Some("check-in")),
                ("createTime", Some("03/01/2024 12:00:00")),
            ]),
            raw_event("check-in", "x", "7", "03/02/2024 12:00:00"),
        ];

        let result = reconciler.reconcile(&raw_events, &[], today());
        assert_eq!(result.events.len(), 2);
        assert_eq!(result.total_points, 7);
    }

    #[test]
    fn test_malformed_tier_skipped() {
        let reconciler = PointsReconciler::new(&test_config());
        let tiers = vec![
            raw_tier("ten", "Broken"),
            raw(&[("Points_Needed_c", Some("10"))]),
            raw_tier("10", "A"),
        ];

        let result = reconciler.reconcile(&[], &tiers, today());
        assert_eq!(result.next_reward.as_deref(), Some("A"));
    }

    #[test]
    fn test_idempotence() {
        let reconciler = PointsReconciler::new(&test_config());
        let raw_events = vec![
            raw_event("check-in", "Tulsa Web Devs", "5", "03/20/2024 18:00:00"),
            raw_event("data-update", "linkedin", "10", "02/10/2024 09:00:00"),
        ];
        let tiers = vec![raw_tier("10", "Sticker"), raw_tier("50", "Shirt")];

        let first = reconciler.reconcile(&raw_events, &tiers, today());
        let second = reconciler.reconcile(&raw_events, &tiers, today());
        assert_eq!(first, second);
    }
}

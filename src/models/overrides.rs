// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Availability overrides (disabled dates and slots).

use super::SlotId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A single (date, slot) removed from bookability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct DisabledSlot {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub date: NaiveDate,
    pub slot_id: SlotId,
}

/// Singleton document at `config/calendar`.
///
/// Serialized as `{ disabledDates: string[], disabledSlots: {date, slotId}[] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct OverridesConfig {
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "Array<string>"))]
    pub disabled_dates: BTreeSet<NaiveDate>,
    #[serde(default)]
    pub disabled_slots: BTreeSet<DisabledSlot>,
}

impl OverridesConfig {
    pub fn is_date_disabled(&self, date: NaiveDate) -> bool {
        self.disabled_dates.contains(&date)
    }

    pub fn is_slot_disabled(&self, date: NaiveDate, slot_id: SlotId) -> bool {
        self.disabled_slots
            .contains(&DisabledSlot { date, slot_id })
    }

    /// Add or remove a date. Returns whether the set changed.
    pub fn set_date_disabled(&mut self, date: NaiveDate, disabled: bool) -> bool {
        if disabled {
            self.disabled_dates.insert(date)
        } else {
            self.disabled_dates.remove(&date)
        }
    }

    /// Add or remove a (date, slot). Returns whether the set changed.
    pub fn set_slot_disabled(&mut self, date: NaiveDate, slot_id: SlotId, disabled: bool) -> bool {
        let entry = DisabledSlot { date, slot_id };
        if disabled {
            self.disabled_slots.insert(entry)
        } else {
            self.disabled_slots.remove(&entry)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_document_layout() {
        let json = r#"{
            "disabledDates": ["2025-12-25"],
            "disabledSlots": [{"date": "2025-12-24", "slotId": "afternoon"}]
        }"#;
        let config: OverridesConfig = serde_json::from_str(json).unwrap();

        let christmas = NaiveDate::from_ymd_opt(2025, 12, 25).unwrap();
        let eve = NaiveDate::from_ymd_opt(2025, 12, 24).unwrap();
        assert!(config.is_date_disabled(christmas));
        assert!(!config.is_date_disabled(eve));
        assert!(config.is_slot_disabled(eve, SlotId::Afternoon));
        assert!(!config.is_slot_disabled(eve, SlotId::Morning));
    }

    #[test]
    fn test_missing_document_fields_mean_nothing_disabled() {
        let config: OverridesConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, OverridesConfig::default());
    }

    #[test]
    fn test_toggles_report_changes() {
        let mut config = OverridesConfig::default();
        let date = NaiveDate::from_ymd_opt(2025, 8, 15).unwrap();

        assert!(config.set_date_disabled(date, true));
        assert!(!config.set_date_disabled(date, true));
        assert!(config.set_date_disabled(date, false));

        assert!(config.set_slot_disabled(date, SlotId::Morning, true));
        assert!(config.is_slot_disabled(date, SlotId::Morning));
        assert!(config.set_slot_disabled(date, SlotId::Morning, false));
        assert!(config.disabled_slots.is_empty());
    }
}

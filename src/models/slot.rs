// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fixed daily time slots.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// One of the two bookable windows of a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum SlotId {
    Morning,
    Afternoon,
}

impl SlotId {
    pub const ALL: [SlotId; 2] = [SlotId::Morning, SlotId::Afternoon];

    pub fn as_str(self) -> &'static str {
        match self {
            SlotId::Morning => "morning",
            SlotId::Afternoon => "afternoon",
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "morning" => Ok(SlotId::Morning),
            "afternoon" => Ok(SlotId::Afternoon),
            other => Err(format!("Unknown slot '{}'", other)),
        }
    }
}

/// Slot catalogue entry (24h clock, end exclusive).
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct SlotDefinition {
    pub id: SlotId,
    pub label: &'static str,
    pub start_hour: u8,
    pub end_hour: u8,
}

/// The slot set is static configuration, identical for every tenant.
pub const SLOTS: [SlotDefinition; 2] = [
    SlotDefinition {
        id: SlotId::Morning,
        label: "Morning",
        start_hour: 9,
        end_hour: 13,
    },
    SlotDefinition {
        id: SlotId::Afternoon,
        label: "Afternoon",
        start_hour: 15,
        end_hour: 18,
    },
];

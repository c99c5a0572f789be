//! Run definitions
//!
//! A run definition is a named, ordered list of activities describing one
//! validation scenario. Definitions reference activities through the closed
//! `ActivityName` enum, so a built-in definition cannot name an activity that
//! does not exist.

use serde::{Deserialize, Serialize};

use super::activity_name::ActivityName;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDefinition {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub activities: Vec<ActivityName>,

    /// Rebuild READY from the scrambled dataset before the first activity
    #[serde(default)]
    pub reseed: bool,

    /// Make this run the new golden baseline
    #[serde(default)]
    pub golden: bool,
}

impl RunDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        activities: impl IntoIterator<Item = ActivityName>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            activities: activities.into_iter().collect(),
            reseed: false,
            golden: false,
        }
    }

    pub fn with_reseed(mut self) -> Self {
        self.reseed = true;
        self
    }

    pub fn as_golden(mut self) -> Self {
        self.golden = true;
        self
    }

    /// The same definition restarted at `start`, for resuming after the last
    /// successful activity of a halted run.
    ///
    /// Returns `None` when `start` is not part of this definition.
    pub fn starting_at(&self, start: ActivityName) -> Option<RunDefinition> {
        let index = self.activities.iter().position(|a| *a == start)?;
        Some(RunDefinition {
            activities: self.activities[index..].to_vec(),
            ..self.clone()
        })
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.activities.iter().map(|a| a.code()).collect()
    }
}

/// The scenarios shipped with the harness
pub fn builtin() -> Vec<RunDefinition> {
    use ActivityName::*;

    vec![
        RunDefinition::new(
            "ready-year-end",
            "Full year-end pipeline on READY",
            ActivityName::ready(),
        ),
        RunDefinition::new(
            "smart-year-end",
            "Full year-end pipeline on SMART",
            ActivityName::smart(),
        ),
        RunDefinition::new(
            "side-by-side",
            "Full year-end pipeline, each step on READY and SMART together",
            ActivityName::paired(),
        ),
        RunDefinition::new(
            "golden",
            "Full READY pipeline, captured as the new golden baseline",
            ActivityName::ready(),
        )
        .as_golden(),
        RunDefinition::new(
            "termination",
            "Termination processing on both systems from a fresh scramble",
            [R03ProfTermination, S03ProfTermination],
        )
        .with_reseed(),
        RunDefinition::new(
            "frozen-reports",
            "Freeze, then the edit and final PAY426 runs on both systems",
            [
                R12ProfLoadYrEndDemoProfitShare,
                R17ProfitShareReportEditRun,
                R18ProfitShareReportFinalRun,
                S12ProfLoadYrEndDemoProfitShare,
                S17ProfitShareReportEditRun,
                S18ProfitShareReportFinalRun,
            ],
        )
        .with_reseed(),
        RunDefinition::new(
            "profit-share-update",
            "Forfeit, update, edit and master update on READY",
            [
                R20ProfitForfeit,
                R21ProfitShareUpdate,
                R22ProfitShareEdit,
                R23ProfitMasterUpdate,
                R24ProfPayMasterUpdate,
                R24BProfPayMasterUpdatePartTwo,
            ],
        ),
        RunDefinition::new(
            "smart-profit-share-update",
            "Forfeit, update, edit and master update on SMART",
            [
                S20ProfitForfeit,
                S21ProfitShareUpdate,
                S22ProfitShareEdit,
                S23ProfitMasterUpdate,
                S24ProfPayMasterUpdate,
                S24BProfPayMasterUpdatePartTwo,
            ],
        ),
    ]
}

pub fn find<'a>(definitions: &'a [RunDefinition], name: &str) -> Option<&'a RunDefinition> {
    definitions.iter().find(|d| d.name.eq_ignore_ascii_case(name))
}

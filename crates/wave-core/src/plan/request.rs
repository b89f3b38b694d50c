//! Incoming plan requests and their structural validation.
//!
//! Validation is pure: it never touches the store, so a rejected request
//! never opens a transaction. Every missing field at every level is
//! collected and reported together, each with its path in the request
//! (`patient_id`, `days[1].items`, `days[0].items[2].name`).

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::item::{ExerciseSpec, LibraryItemSpec, MealSpec};

/// A structurally incomplete plan or library item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing_data: {}", .missing_fields.join(", "))]
pub struct ValidationError {
    pub missing_fields: Vec<String>,
}

impl ValidationError {
    /// Whether `field` is among the reported paths.
    pub fn names(&self, field: &str) -> bool {
        self.missing_fields.iter().any(|f| f == field)
    }
}

/// One day of a requested plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "I: LibraryItemSpec"))]
pub struct DayRequest<I> {
    #[serde(default)]
    pub day_index: i32,
    /// Overwritten with the plan owner before the day is stored.
    #[serde(default)]
    pub health_specialist_id: String,
    #[serde(default, alias = "meals", alias = "exercises")]
    pub items: Vec<I>,
}

impl<I> DayRequest<I> {
    pub fn new(day_index: i32, items: Vec<I>) -> Self {
        Self {
            day_index,
            health_specialist_id: String::new(),
            items,
        }
    }
}

/// A treatment plan as submitted by a specialist for one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "I: LibraryItemSpec"))]
pub struct PlanRequest<I> {
    #[serde(default)]
    pub health_specialist_id: String,
    #[serde(default)]
    pub patient_id: String,
    #[serde(default, alias = "daily_plans")]
    pub days: Vec<DayRequest<I>>,
}

/// Meal-plan request.
pub type MealPlanRequest = PlanRequest<MealSpec>;

/// Exercise-plan request.
pub type ExercisePlanRequest = PlanRequest<ExerciseSpec>;

impl<I: LibraryItemSpec> PlanRequest<I> {
    pub fn new(
        health_specialist_id: impl Into<String>,
        patient_id: impl Into<String>,
        days: Vec<DayRequest<I>>,
    ) -> Self {
        Self {
            health_specialist_id: health_specialist_id.into(),
            patient_id: patient_id.into(),
            days,
        }
    }

    /// Check structural completeness, collecting every missing field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut missing = Vec::new();

        if self.health_specialist_id.is_empty() {
            missing.push("health_specialist_id".to_owned());
        }
        if self.patient_id.is_empty() {
            missing.push("patient_id".to_owned());
        }
        if self.days.is_empty() {
            missing.push("days".to_owned());
        }

        for (d, day) in self.days.iter().enumerate() {
            if day.items.is_empty() {
                missing.push(format!("days[{d}].items"));
                continue;
            }
            for (i, item) in day.items.iter().enumerate() {
                for field in item.missing_fields(&self.health_specialist_id) {
                    missing.push(format!("days[{d}].items[{i}].{field}"));
                }
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                missing_fields: missing,
            })
        }
    }

    /// Scope every day and item to the plan owner.
    ///
    /// Days and items always inherit the plan's specialist, overriding any
    /// caller-supplied value, so deduplication happens within one library.
    pub fn stamp_ownership(&mut self) {
        let owner = self.health_specialist_id.as_str();
        for day in &mut self.days {
            owner.clone_into(&mut day.health_specialist_id);
            for item in &mut day.items {
                if item.health_specialist_id() != owner {
                    item.stamp_owner(owner);
                }
            }
        }
    }

    /// Total number of items across all days.
    pub fn item_count(&self) -> usize {
        self.days.iter().map(|d| d.items.len()).sum()
    }

    /// Day indices that occur more than once, in first-repeat order.
    ///
    /// Repeated or non-contiguous indices are accepted; this only feeds
    /// diagnostics.
    pub fn repeated_day_indices(&self) -> Vec<i32> {
        let mut seen = HashSet::new();
        let mut repeated = Vec::new();
        for day in &self.days {
            if !seen.insert(day.day_index) && !repeated.contains(&day.day_index) {
                repeated.push(day.day_index);
            }
        }
        repeated
    }

    /// Parse a request from JSON.
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("failed to parse plan request JSON")
    }

    /// Parse a request from TOML (`[[days]]` tables with `[[days.items]]`).
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse plan request TOML")
    }

    /// Read a request file, choosing the format by extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read plan file: {}", path.display()))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            other => bail!(
                "unsupported plan file extension {:?} (expected .json or .toml)",
                other.unwrap_or("")
            ),
        }
    }
}

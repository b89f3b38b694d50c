use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{EXERCISE_NAME_OWNER_KEY, MEAL_NAME_OWNER_KEY};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Treatment track a plan belongs to. A patient holds at most one plan of
/// each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Meal,
    Exercise,
}

impl PlanKind {
    /// Library table holding items of this kind.
    pub fn item_table(self) -> &'static str {
        match self {
            Self::Meal => "meals",
            Self::Exercise => "exercises",
        }
    }

    /// Relation table linking items of this kind to daily plans.
    pub fn map_table(self) -> &'static str {
        match self {
            Self::Meal => "meal_maps",
            Self::Exercise => "exercise_maps",
        }
    }

    /// Item foreign-key column in [`Self::map_table`].
    pub fn item_column(self) -> &'static str {
        match self {
            Self::Meal => "meal_id",
            Self::Exercise => "exercise_id",
        }
    }

    /// Natural-key constraint on [`Self::item_table`].
    pub fn natural_key_constraint(self) -> &'static str {
        match self {
            Self::Meal => MEAL_NAME_OWNER_KEY,
            Self::Exercise => EXERCISE_NAME_OWNER_KEY,
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Meal => "meal",
            Self::Exercise => "exercise",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanKind {
    type Err = PlanKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meal" => Ok(Self::Meal),
            "exercise" => Ok(Self::Exercise),
            other => Err(PlanKindParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`PlanKind`] string.
#[derive(Debug, Clone)]
pub struct PlanKindParseError(pub String);

impl fmt::Display for PlanKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid plan kind: {:?} (expected meal or exercise)", self.0)
    }
}

impl std::error::Error for PlanKindParseError {}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A treatment plan for one patient, authored by one specialist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: Uuid,
    pub kind: PlanKind,
    pub health_specialist_id: String,
    pub patient_id: String,
    pub created_at: DateTime<Utc>,
}

/// One day within a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DailyPlan {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub day_index: i32,
    pub health_specialist_id: String,
    pub created_at: DateTime<Utc>,
}

/// A reusable meal definition owned by a specialist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Meal {
    pub id: Uuid,
    pub name: String,
    pub health_specialist_id: String,
    pub ingredients: Vec<String>,
    pub cals: i32,
    pub description: String,
    pub meal_type: String,
    pub created_at: DateTime<Utc>,
}

/// A reusable exercise definition owned by a specialist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Exercise {
    pub id: Uuid,
    pub name: String,
    pub health_specialist_id: String,
    pub reps: i32,
    pub sets: i32,
    pub description: String,
    pub exercise_type: String,
    pub created_at: DateTime<Utc>,
}

/// A library item of either kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LibraryItem {
    Meal(Meal),
    Exercise(Exercise),
}

impl LibraryItem {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Meal(m) => m.id,
            Self::Exercise(e) => e.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Meal(m) => &m.name,
            Self::Exercise(e) => &e.name,
        }
    }

    pub fn health_specialist_id(&self) -> &str {
        match self {
            Self::Meal(m) => &m.health_specialist_id,
            Self::Exercise(e) => &e.health_specialist_id,
        }
    }

    pub fn kind(&self) -> PlanKind {
        match self {
            Self::Meal(_) => PlanKind::Meal,
            Self::Exercise(_) => PlanKind::Exercise,
        }
    }
}

/// Join row attributing one library item to one day of one plan.
///
/// Stored in `meal_maps` or `exercise_maps`; the item column is read back as
/// `item_id` for both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RelationMap {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub daily_plan_id: Uuid,
    pub item_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Insert parameters
// ---------------------------------------------------------------------------

/// Parameters for inserting a new meal row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeal<'a> {
    pub name: &'a str,
    pub health_specialist_id: &'a str,
    pub ingredients: &'a [String],
    pub cals: i32,
    pub description: &'a str,
    pub meal_type: &'a str,
}

/// Parameters for inserting a new exercise row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExercise<'a> {
    pub name: &'a str,
    pub health_specialist_id: &'a str,
    pub reps: i32,
    pub sets: i32,
    pub description: &'a str,
    pub exercise_type: &'a str,
}

/// Parameters for inserting a library item of either kind.
#[derive(Debug, Clone, PartialEq)]
pub enum NewLibraryItem<'a> {
    Meal(NewMeal<'a>),
    Exercise(NewExercise<'a>),
}

impl NewLibraryItem<'_> {
    pub fn kind(&self) -> PlanKind {
        match self {
            Self::Meal(_) => PlanKind::Meal,
            Self::Exercise(_) => PlanKind::Exercise,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Meal(m) => m.name,
            Self::Exercise(e) => e.name,
        }
    }

    pub fn health_specialist_id(&self) -> &str {
        match self {
            Self::Meal(m) => m.health_specialist_id,
            Self::Exercise(e) => e.health_specialist_id,
        }
    }
}

//! Library item definitions as they arrive in a plan request.
//!
//! [`LibraryItemSpec`] is the item-kind descriptor the provisioning
//! coordinator is generic over: it names the plan kind, exposes the natural
//! key, stamps ownership and validates required fields. Meals and exercises
//! differ only in their descriptive fields.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use wave_db::models::{NewExercise, NewLibraryItem, NewMeal, PlanKind};

/// Capability set of one library-item kind.
pub trait LibraryItemSpec:
    Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Plan kind whose days reference items of this type.
    const KIND: PlanKind;

    /// Name half of the natural key.
    fn name(&self) -> &str;

    /// Owner half of the natural key.
    fn health_specialist_id(&self) -> &str;

    /// Scope the item to `owner`.
    fn stamp_owner(&mut self, owner: &str);

    /// Borrow the item as insert parameters.
    fn as_new_item(&self) -> NewLibraryItem<'_>;

    /// Required fields that are missing.
    ///
    /// An empty owner is acceptable when `inherited_owner` is non-empty,
    /// because the item will be stamped with it before it is stored.
    fn missing_fields(&self, inherited_owner: &str) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name().is_empty() {
            missing.push("name");
        }
        if self.health_specialist_id().is_empty() && inherited_owner.is_empty() {
            missing.push("health_specialist_id");
        }
        missing
    }
}

/// A meal as supplied by a specialist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub health_specialist_id: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub cals: i32,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub meal_type: String,
}

impl MealSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl LibraryItemSpec for MealSpec {
    const KIND: PlanKind = PlanKind::Meal;

    fn name(&self) -> &str {
        &self.name
    }

    fn health_specialist_id(&self) -> &str {
        &self.health_specialist_id
    }

    fn stamp_owner(&mut self, owner: &str) {
        owner.clone_into(&mut self.health_specialist_id);
    }

    fn as_new_item(&self) -> NewLibraryItem<'_> {
        NewLibraryItem::Meal(NewMeal {
            name: &self.name,
            health_specialist_id: &self.health_specialist_id,
            ingredients: &self.ingredients,
            cals: self.cals,
            description: &self.description,
            meal_type: &self.meal_type,
        })
    }
}

/// An exercise as supplied by a specialist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub health_specialist_id: String,
    #[serde(default)]
    pub reps: i32,
    #[serde(default)]
    pub sets: i32,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub exercise_type: String,
}

impl ExerciseSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl LibraryItemSpec for ExerciseSpec {
    const KIND: PlanKind = PlanKind::Exercise;

    fn name(&self) -> &str {
        &self.name
    }

    fn health_specialist_id(&self) -> &str {
        &self.health_specialist_id
    }

    fn stamp_owner(&mut self, owner: &str) {
        owner.clone_into(&mut self.health_specialist_id);
    }

    fn as_new_item(&self) -> NewLibraryItem<'_> {
        NewLibraryItem::Exercise(NewExercise {
            name: &self.name,
            health_specialist_id: &self.health_specialist_id,
            reps: self.reps,
            sets: self.sets,
            description: &self.description,
            exercise_type: &self.exercise_type,
        })
    }
}

//! Plan provisioning: request model, store seam, item resolution, relation
//! mapping and the transactional coordinator.

pub mod error;
pub mod graph;
pub mod item;
pub mod memory;
pub mod postgres;
pub mod relation;
pub mod request;
pub mod resolver;
pub mod service;
pub mod store;

pub use error::{ProvisionError, RegisterError};
pub use graph::PersistedPlan;
pub use item::{ExerciseSpec, LibraryItemSpec, MealSpec};
pub use memory::MemoryPlanStore;
pub use postgres::PgPlanStore;
pub use request::{DayRequest, ExercisePlanRequest, MealPlanRequest, PlanRequest, ValidationError};
pub use resolver::{Resolution, resolve_or_create};
pub use service::PlanProvisioner;
pub use store::{PlanStore, PlanTransaction};

pub mod daily_plans;
pub mod exercises;
pub mod meals;
pub mod plans;
pub mod relation_maps;

//! PostgreSQL persistence for treatment plans, library items and their
//! relation maps.

pub mod config;
pub mod error;
pub mod models;
pub mod pool;
pub mod queries;

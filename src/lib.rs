//! Personalized weekly study-plan scheduling.
//!
//! The pipeline is `aggregate` -> `patterns` -> `priority` -> `scheduler`, wrapped by
//! [`planner::Planner`] for store access. Everything up to the stores is pure.

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod patterns;
pub mod plan;
pub mod planner;
pub mod priority;
pub mod report;
pub mod scheduler;
pub mod store;

pub use catalog::Catalog;
pub use config::PlannerConfig;
pub use error::{PlannerError, PlannerResult};
pub use plan::set_slot_completion;
pub use planner::{plan_week, Planner};
pub use store::{InMemoryStore, PlanStore, ProgressStore};

//! Planner settings. Built from CLI flags in the binary, or deserialized from JSON.

use serde::Deserialize;

use crate::models::TimeOfDay;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerConfig {
    #[serde(default = "default_target_sessions")]
    pub target_sessions_per_week: u32,
    #[serde(default = "default_max_per_day")]
    pub max_sessions_per_day: u32,
    #[serde(default = "default_preferred_times")]
    pub preferred_times: Vec<TimeOfDay>,
    #[serde(default)]
    pub avoid_weekends: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            target_sessions_per_week: default_target_sessions(),
            max_sessions_per_day: default_max_per_day(),
            preferred_times: default_preferred_times(),
            avoid_weekends: false,
        }
    }
}

fn default_target_sessions() -> u32 {
    12
}

fn default_max_per_day() -> u32 {
    3
}

pub fn default_preferred_times() -> Vec<TimeOfDay> {
    [(16, 0), (19, 0), (20, 0)]
        .into_iter()
        .filter_map(|(hour, minute)| TimeOfDay::from_hm(hour, minute))
        .collect()
}

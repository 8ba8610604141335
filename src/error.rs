/// Failures surfaced by the planner's store boundaries and plan mutations.
///
/// The pipeline itself never produces one of these; it degrades to defaults.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// No history or plan exists for the student.
    #[error("no {what} found for student {student_id}")]
    NotFound {
        what: &'static str,
        student_id: String,
    },

    /// Day or slot index outside the plan.
    #[error("slot {slot_index} on day {day_index} is out of range")]
    OutOfRange { day_index: usize, slot_index: usize },

    /// I/O failure talking to a store. Never retried internally.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl PlannerError {
    pub fn history_not_found(student_id: &str) -> Self {
        Self::NotFound {
            what: "progress history",
            student_id: student_id.to_string(),
        }
    }

    pub fn plan_not_found(student_id: &str) -> Self {
        Self::NotFound {
            what: "study plan",
            student_id: student_id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type PlannerResult<T> = Result<T, PlannerError>;

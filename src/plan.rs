use chrono::{DateTime, Utc};

use crate::error::{PlannerError, PlannerResult};
use crate::models::{StudyPlan, StudySlot};

impl StudyPlan {
    pub fn slots(&self) -> impl Iterator<Item = &StudySlot> {
        self.days.iter().flat_map(|day| day.slots.iter())
    }

    pub fn session_count(&self) -> usize {
        self.slots().count()
    }

    pub fn completed_count(&self) -> usize {
        self.slots().filter(|slot| slot.completed).count()
    }

    pub fn computed_expected_xp(&self) -> u32 {
        self.slots().map(|slot| slot.expected_xp).sum()
    }

    pub fn earned_xp(&self) -> u32 {
        self.slots()
            .filter(|slot| slot.completed)
            .map(|slot| slot.expected_xp)
            .sum()
    }

    /// Resets `total_expected_xp` from the slots. Stores call this on every save.
    pub fn with_recomputed_total(mut self) -> Self {
        self.total_expected_xp = self.computed_expected_xp();
        self
    }
}

/// Returns a copy of `plan` with one slot's completion flag set.
///
/// Setting the flag to its current value only bumps `last_modified_at`.
pub fn set_slot_completion(
    plan: &StudyPlan,
    day_index: usize,
    slot_index: usize,
    completed: bool,
    now: DateTime<Utc>,
) -> PlannerResult<StudyPlan> {
    let in_range = plan
        .days
        .get(day_index)
        .is_some_and(|day| slot_index < day.slots.len());
    if !in_range {
        return Err(PlannerError::OutOfRange {
            day_index,
            slot_index,
        });
    }

    let mut updated = plan.clone();
    updated.days[day_index].slots[slot_index].completed = completed;
    updated.last_modified_at = now;
    Ok(updated)
}

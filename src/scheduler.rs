use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::config::{default_preferred_times, PlannerConfig};
use crate::models::{DayPlan, StudyPlan, StudySlot, TimeOfDay};
use crate::priority::StudyCandidate;

pub const DAYS_PER_WEEK: usize = 7;
const WEEKEND_START: usize = 5;
const WEEKEND_CAP: u32 = 2;
const AVOID_WEEKEND_CAP: u32 = 1;

/// Monday on or before the UTC date of `now`.
pub fn week_start(now: DateTime<Utc>) -> NaiveDate {
    let today = now.date_naive();
    today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
}

pub fn day_cap(day_index: usize, config: &PlannerConfig) -> u32 {
    if day_index < WEEKEND_START {
        config.max_sessions_per_day
    } else if config.avoid_weekends {
        config.max_sessions_per_day.min(AVOID_WEEKEND_CAP)
    } else {
        config.max_sessions_per_day.min(WEEKEND_CAP)
    }
}

/// Greedy allocation of ranked candidates into a Monday-first week.
pub fn generate_plan(
    student_id: &str,
    candidates: &[StudyCandidate],
    config: &PlannerConfig,
    best_times: &[TimeOfDay],
    now: DateTime<Utc>,
) -> StudyPlan {
    let start = week_start(now);
    let fallback;
    let times: &[TimeOfDay] = if !best_times.is_empty() {
        best_times
    } else if !config.preferred_times.is_empty() {
        &config.preferred_times
    } else {
        fallback = default_preferred_times();
        &fallback
    };

    let mut pending = candidates.iter();
    let mut scheduled: u32 = 0;
    let mut total_expected_xp = 0;
    let mut days = Vec::with_capacity(DAYS_PER_WEEK);

    for day_index in 0..DAYS_PER_WEEK {
        let remaining_days = (DAYS_PER_WEEK - day_index) as u32;
        let remaining_sessions = config.target_sessions_per_week.saturating_sub(scheduled);
        let sessions_for_day = day_cap(day_index, config).min(remaining_sessions.div_ceil(remaining_days));

        let mut slots = Vec::with_capacity(sessions_for_day as usize);
        for slot_index in 0..sessions_for_day as usize {
            let Some(candidate) = pending.next() else {
                break;
            };
            let expected_xp = candidate.cognitive_level.xp_reward();
            slots.push(StudySlot {
                subject: candidate.subject.clone(),
                topic: candidate.topic.clone(),
                time: times[slot_index % times.len()],
                cognitive_level: candidate.cognitive_level,
                expected_xp,
                difficulty: candidate.cognitive_level.difficulty(),
                completed: false,
            });
            total_expected_xp += expected_xp;
        }

        scheduled += slots.len() as u32;
        days.push(DayPlan {
            date: start + Duration::days(day_index as i64),
            slots,
        });
    }

    tracing::info!(
        student_id,
        week_start = %start,
        sessions = scheduled,
        total_expected_xp,
        "generated weekly plan"
    );

    StudyPlan {
        student_id: student_id.to_string(),
        week_start: start,
        days,
        total_expected_xp,
        created_at: now,
        last_modified_at: now,
    }
}

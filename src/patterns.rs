use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::aggregate;
use crate::models::{CognitiveLevel, StudentProgressSnapshot, TimeOfDay};

/// Scheduling inputs derived from a progress snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPatterns {
    pub best_times: Vec<TimeOfDay>,
    pub weak_subjects: BTreeSet<String>,
    pub cognitive_level_need: BTreeMap<CognitiveLevel, u32>,
}

const BOOTSTRAP_NEED: [(CognitiveLevel, u32); 3] = [
    (CognitiveLevel::Recall, 3),
    (CognitiveLevel::Apply, 2),
    (CognitiveLevel::Analyze, 1),
];

pub fn analyze(snapshot: &StudentProgressSnapshot) -> StudyPatterns {
    let now = snapshot.as_of;
    let questions = aggregate::recent_questions(&snapshot.completed_questions, now);
    let reflections = aggregate::recent_reflections(&snapshot.reflections, now);

    let mut weak_subjects = snapshot.subject_weaknesses.clone();
    weak_subjects.extend(aggregate::weak_subjects(&questions));

    StudyPatterns {
        best_times: aggregate::rank_focus_hours(&reflections),
        weak_subjects,
        cognitive_level_need: cognitive_level_need(&snapshot.cognitive_level_coverage),
    }
}

/// Multiplier per level: under 30% of correct answers doubles it, under 15% doubles again.
pub fn cognitive_level_need(
    coverage: &BTreeMap<CognitiveLevel, u32>,
) -> BTreeMap<CognitiveLevel, u32> {
    let total: u32 = coverage.values().sum();
    if total == 0 {
        return BOOTSTRAP_NEED.into_iter().collect();
    }

    CognitiveLevel::ALL
        .iter()
        .map(|level| {
            let count = coverage.get(level).copied().unwrap_or(0);
            // share < 0.30  <=>  count * 100 < total * 30
            let mut multiplier = 1;
            if count * 100 < total * 30 {
                multiplier *= 2;
                if count * 100 < total * 15 {
                    multiplier *= 2;
                }
            }
            (*level, multiplier)
        })
        .collect()
}

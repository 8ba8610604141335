use serde::Serialize;

use crate::catalog::Catalog;
use crate::models::{CognitiveLevel, Difficulty};
use crate::patterns::StudyPatterns;

pub const MAX_CANDIDATES: usize = 20;
const WEAK_SUBJECT_BONUS: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyCandidate {
    pub subject: String,
    pub topic: String,
    pub cognitive_level: CognitiveLevel,
    pub priority_score: u32,
    pub difficulty: Difficulty,
}

/// Ranks every catalog (subject, topic, level) pair, highest score first.
///
/// The sort is stable, so equal scores keep catalog order.
pub fn prioritize(patterns: &StudyPatterns, catalog: &Catalog) -> Vec<StudyCandidate> {
    let mut candidates = Vec::new();

    for subject in &catalog.subjects {
        let subject_priority = if patterns.weak_subjects.contains(&subject.name) {
            1 + WEAK_SUBJECT_BONUS
        } else {
            1
        };

        for topic in &subject.topics {
            for level in &subject.cognitive_levels {
                let need = patterns
                    .cognitive_level_need
                    .get(level)
                    .copied()
                    .unwrap_or(1);
                candidates.push(StudyCandidate {
                    subject: subject.name.clone(),
                    topic: topic.clone(),
                    cognitive_level: *level,
                    priority_score: subject_priority * need,
                    difficulty: level.difficulty(),
                });
            }
        }
    }

    candidates.sort_by(|a, b| b.priority_score.cmp(&a.priority_score));
    candidates.truncate(MAX_CANDIDATES);
    candidates
}

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};

use crate::models::{
    CognitiveLevel, CompletedQuestionRecord, ReflectionRecord, StudentHistory,
    StudentProgressSnapshot, TimeOfDay, WeeklyStatsSnapshot,
};

pub const WINDOW_DAYS: i64 = 7;
pub const WEAK_MIN_ATTEMPTS: u32 = 3;
const NEUTRAL_MOOD: f64 = 3.0;

pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(WINDOW_DAYS)
}

pub fn in_window(occurred_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    occurred_at >= window_start(now) && occurred_at <= now
}

pub fn recent_questions(
    questions: &[CompletedQuestionRecord],
    now: DateTime<Utc>,
) -> Vec<&CompletedQuestionRecord> {
    questions
        .iter()
        .filter(|question| in_window(question.occurred_at, now))
        .collect()
}

pub fn recent_reflections(
    reflections: &[ReflectionRecord],
    now: DateTime<Utc>,
) -> Vec<&ReflectionRecord> {
    reflections
        .iter()
        .filter(|reflection| in_window(reflection.occurred_at, now))
        .collect()
}

/// Builds the per-run snapshot. Never fails: empty histories produce zeroed stats.
pub fn build_snapshot(history: StudentHistory, now: DateTime<Utc>) -> StudentProgressSnapshot {
    let questions = recent_questions(&history.completed_questions, now);
    let reflections = recent_reflections(&history.reflections, now);

    let weekly_stats = weekly_stats(&questions, &reflections);
    let subject_weaknesses = weak_subjects(&questions);
    let cognitive_level_coverage = cognitive_coverage(&questions);
    let total_xp = history
        .completed_questions
        .iter()
        .map(|question| question.xp_awarded)
        .sum();

    tracing::debug!(
        student_id = %history.student_id,
        recent_questions = questions.len(),
        recent_reflections = reflections.len(),
        weak_subjects = subject_weaknesses.len(),
        "aggregated progress snapshot"
    );

    StudentProgressSnapshot {
        student_id: history.student_id,
        total_xp,
        completed_questions: history.completed_questions,
        reflections: history.reflections,
        weekly_stats,
        subject_weaknesses,
        cognitive_level_coverage,
        as_of: now,
    }
}

pub fn weekly_stats(
    questions: &[&CompletedQuestionRecord],
    reflections: &[&ReflectionRecord],
) -> WeeklyStatsSnapshot {
    let average_mood = if reflections.is_empty() {
        NEUTRAL_MOOD
    } else {
        let total: u32 = reflections.iter().map(|r| r.mood.score()).sum();
        total as f64 / reflections.len() as f64
    };

    WeeklyStatsSnapshot {
        questions_answered: questions.len() as u32,
        correct_answers: questions.iter().filter(|q| q.correct).count() as u32,
        total_xp: questions.iter().map(|q| q.xp_awarded).sum(),
        average_mood,
        peak_focus_time: rank_focus_hours(reflections).into_iter().next(),
    }
}

pub fn focus_score(reflection: &ReflectionRecord) -> u32 {
    let fatigue = u32::from(reflection.fatigue_level.clamp(1, 5));
    reflection.mood.score() + (6 - fatigue)
}

/// Hour buckets ordered by average focus score, best first.
///
/// Ties go to the earlier hour. Each bucket is reported as `HH:00`.
pub fn rank_focus_hours(reflections: &[&ReflectionRecord]) -> Vec<TimeOfDay> {
    let mut buckets: BTreeMap<u32, (u32, u32)> = BTreeMap::new();

    for reflection in reflections {
        let entry = buckets
            .entry(reflection.time_of_day.hour())
            .or_insert((0, 0));
        entry.0 += focus_score(reflection);
        entry.1 += 1;
    }

    let mut ranked: Vec<(u32, (u32, u32))> = buckets.into_iter().collect();
    // a/b > c/d  <=>  a*d > c*b, keeps the comparison exact
    ranked.sort_by(|(_, (sum_a, n_a)), (_, (sum_b, n_b))| {
        let lhs = u64::from(*sum_b) * u64::from(*n_a);
        let rhs = u64::from(*sum_a) * u64::from(*n_b);
        lhs.cmp(&rhs)
    });

    ranked
        .into_iter()
        .filter_map(|(hour, _)| TimeOfDay::from_hm(hour, 0))
        .collect()
}

/// Subjects with enough attempts and a correct rate under 60%.
pub fn weak_subjects(questions: &[&CompletedQuestionRecord]) -> BTreeSet<String> {
    let mut tallies: BTreeMap<&str, (u32, u32)> = BTreeMap::new();

    for question in questions {
        let entry = tallies.entry(question.subject.as_str()).or_insert((0, 0));
        entry.0 += 1;
        if question.correct {
            entry.1 += 1;
        }
    }

    tallies
        .into_iter()
        .filter(|(_, (attempts, correct))| {
            *attempts >= WEAK_MIN_ATTEMPTS && correct * 5 < attempts * 3
        })
        .map(|(subject, _)| subject.to_string())
        .collect()
}

pub fn cognitive_coverage(
    questions: &[&CompletedQuestionRecord],
) -> BTreeMap<CognitiveLevel, u32> {
    let mut coverage: BTreeMap<CognitiveLevel, u32> =
        CognitiveLevel::ALL.iter().map(|level| (*level, 0)).collect();

    for question in questions.iter().filter(|q| q.correct) {
        if let Some(level) = question.cognitive_level {
            *coverage.entry(level).or_insert(0) += 1;
        }
    }

    coverage
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::MoodLabel;
    use chrono::TimeZone;

    pub fn fixed_now() -> DateTime<Utc> {
        // Wednesday
        Utc.with_ymd_and_hms(2026, 3, 11, 12, 0, 0).unwrap()
    }

    pub fn question(
        subject: &str,
        correct: bool,
        level: Option<CognitiveLevel>,
        days_ago: i64,
    ) -> CompletedQuestionRecord {
        CompletedQuestionRecord {
            subject: subject.to_string(),
            topic: "General".to_string(),
            correct,
            cognitive_level: level,
            xp_awarded: if correct { 10 } else { 0 },
            occurred_at: fixed_now() - Duration::days(days_ago),
            time_spent_secs: None,
        }
    }

    pub fn reflection(mood: MoodLabel, fatigue: u8, time: &str, days_ago: i64) -> ReflectionRecord {
        ReflectionRecord {
            mood,
            fatigue_level: fatigue,
            time_of_day: time.parse().unwrap(),
            note: None,
            occurred_at: fixed_now() - Duration::days(days_ago),
        }
    }

    fn history(
        questions: Vec<CompletedQuestionRecord>,
        reflections: Vec<ReflectionRecord>,
    ) -> StudentHistory {
        StudentHistory {
            student_id: "stu-1".to_string(),
            completed_questions: questions,
            reflections,
        }
    }

    #[test]
    fn empty_history_yields_defaults() {
        let snapshot = build_snapshot(history(vec![], vec![]), fixed_now());
        assert_eq!(snapshot.weekly_stats.questions_answered, 0);
        assert_eq!(snapshot.weekly_stats.total_xp, 0);
        assert_eq!(snapshot.weekly_stats.average_mood, 3.0);
        assert_eq!(snapshot.weekly_stats.peak_focus_time, None);
        assert!(snapshot.subject_weaknesses.is_empty());
        assert!(snapshot.cognitive_level_coverage.values().all(|count| *count == 0));
    }

    #[test]
    fn weekly_stats_ignore_entries_outside_window() {
        let questions = vec![
            question("Math", true, Some(CognitiveLevel::Recall), 1),
            question("Math", false, Some(CognitiveLevel::Apply), 3),
            question("Math", true, Some(CognitiveLevel::Apply), 20),
        ];
        let snapshot = build_snapshot(history(questions, vec![]), fixed_now());
        assert_eq!(snapshot.weekly_stats.questions_answered, 2);
        assert_eq!(snapshot.weekly_stats.correct_answers, 1);
        assert_eq!(snapshot.weekly_stats.total_xp, 10);
        assert_eq!(snapshot.total_xp, 20);
        assert_eq!(snapshot.completed_questions.len(), 3);
    }

    #[test]
    fn average_mood_uses_score_table() {
        let reflections = vec![
            reflection(MoodLabel::Excellent, 2, "09:00", 1),
            reflection(MoodLabel::Poor, 2, "09:30", 2),
        ];
        let snapshot = build_snapshot(history(vec![], reflections), fixed_now());
        assert!((snapshot.weekly_stats.average_mood - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn peak_focus_picks_best_hour_average() {
        let reflections = vec![
            // 09h: (5+5) and (1+1) -> average 6
            reflection(MoodLabel::Excellent, 1, "09:10", 1),
            reflection(MoodLabel::Struggling, 5, "09:50", 1),
            // 19h: 4+4 -> 8
            reflection(MoodLabel::Good, 2, "19:05", 2),
        ];
        let snapshot = build_snapshot(history(vec![], reflections), fixed_now());
        assert_eq!(
            snapshot.weekly_stats.peak_focus_time.map(|t| t.to_string()),
            Some("19:00".to_string())
        );
    }

    #[test]
    fn focus_ties_favor_earlier_hour() {
        let a = reflection(MoodLabel::Good, 3, "20:00", 1);
        let b = reflection(MoodLabel::Good, 3, "08:00", 1);
        let ranked: Vec<String> = rank_focus_hours(&[&a, &b])
            .into_iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(ranked, vec!["08:00", "20:00"]);
    }

    #[test]
    fn weak_subject_needs_three_attempts_and_low_accuracy() {
        let questions = vec![
            question("Physics", false, None, 1),
            question("Physics", false, None, 1),
            question("Physics", true, None, 1),
            question("Chemistry", false, None, 1),
            question("Chemistry", false, None, 1),
            question("Biology", true, None, 1),
            question("Biology", true, None, 1),
            question("Biology", false, None, 1),
        ];
        let snapshot = build_snapshot(history(questions, vec![]), fixed_now());
        assert_eq!(
            snapshot.subject_weaknesses.into_iter().collect::<Vec<_>>(),
            vec!["Physics".to_string()]
        );
    }

    #[test]
    fn sixty_percent_is_not_weak() {
        let questions = vec![
            question("Math", true, None, 1),
            question("Math", true, None, 1),
            question("Math", true, None, 1),
            question("Math", false, None, 1),
            question("Math", false, None, 1),
        ];
        let refs: Vec<&CompletedQuestionRecord> = questions.iter().collect();
        assert!(weak_subjects(&refs).is_empty());
    }

    #[test]
    fn coverage_counts_only_correct_levelled_answers() {
        let questions = vec![
            question("Math", true, Some(CognitiveLevel::Recall), 1),
            question("Math", true, Some(CognitiveLevel::Recall), 1),
            question("Math", false, Some(CognitiveLevel::Analyze), 1),
            question("Math", true, None, 1),
        ];
        let snapshot = build_snapshot(history(questions, vec![]), fixed_now());
        assert_eq!(snapshot.cognitive_level_coverage[&CognitiveLevel::Recall], 2);
        assert_eq!(snapshot.cognitive_level_coverage[&CognitiveLevel::Apply], 0);
        assert_eq!(snapshot.cognitive_level_coverage[&CognitiveLevel::Analyze], 0);
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let now = fixed_now();
        assert!(in_window(now - Duration::days(7), now));
        assert!(!in_window(now - Duration::days(7) - Duration::seconds(1), now));
        assert!(!in_window(now + Duration::seconds(1), now));
    }
}

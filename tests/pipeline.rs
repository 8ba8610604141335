use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc, Weekday};
use study_planner::aggregate::build_snapshot;
use study_planner::models::{
    CognitiveLevel, CompletedQuestionRecord, MoodLabel, ReflectionRecord, StudentHistory,
};
use study_planner::patterns::analyze;
use study_planner::priority::prioritize;
use study_planner::{
    plan_week, set_slot_completion, Catalog, InMemoryStore, PlanStore, Planner, PlannerConfig,
    PlannerError,
};

fn now() -> DateTime<Utc> {
    // Saturday afternoon; the plan week starts Monday 2026-05-04
    Utc.with_ymd_and_hms(2026, 5, 9, 15, 30, 0).unwrap()
}

fn answered(subject: &str, correct: bool, level: CognitiveLevel, hours_ago: i64) -> CompletedQuestionRecord {
    CompletedQuestionRecord {
        subject: subject.to_string(),
        topic: "Mixed".to_string(),
        correct,
        cognitive_level: Some(level),
        xp_awarded: if correct { level.xp_reward() } else { 0 },
        occurred_at: now() - Duration::hours(hours_ago),
        time_spent_secs: Some(240),
    }
}

fn empty_history(student_id: &str) -> StudentHistory {
    StudentHistory {
        student_id: student_id.to_string(),
        ..Default::default()
    }
}

#[test]
fn empty_learner_gets_bootstrap_week() {
    let snapshot = build_snapshot(empty_history("fresh"), now());
    let patterns = analyze(&snapshot);
    assert_eq!(patterns.cognitive_level_need[&CognitiveLevel::Recall], 3);
    assert_eq!(patterns.cognitive_level_need[&CognitiveLevel::Apply], 2);
    assert_eq!(patterns.cognitive_level_need[&CognitiveLevel::Analyze], 1);

    let (plan, _) = plan_week(&snapshot, &Catalog::builtin(), &PlannerConfig::default());
    assert_eq!(plan.week_start.weekday(), Weekday::Mon);
    assert_eq!(plan.week_start.to_string(), "2026-05-04");
    assert_eq!(plan.days.len(), 7);

    let monday = &plan.days[0];
    assert_eq!(monday.slots.len(), 2);
    assert_eq!(monday.slots[0].time.to_string(), "16:00");
    assert_eq!(monday.slots[1].time.to_string(), "19:00");
    assert_eq!(plan.total_expected_xp, plan.computed_expected_xp());
}

#[test]
fn weak_subject_triples_priority() {
    let mut history = empty_history("struggler");
    history.completed_questions = vec![
        answered("Science", true, CognitiveLevel::Recall, 2),
        answered("Science", false, CognitiveLevel::Recall, 3),
        answered("Science", false, CognitiveLevel::Apply, 4),
        answered("Science", false, CognitiveLevel::Apply, 5),
        answered("Science", false, CognitiveLevel::Analyze, 6),
    ];
    let snapshot = build_snapshot(history, now());
    let patterns = analyze(&snapshot);
    assert!(patterns.weak_subjects.contains("Science"));

    let catalog = Catalog::from_json(
        r#"{
            "Mathematics": {"topics": ["Algebra"], "cognitiveLevels": ["Recall", "Apply", "Analyze"]},
            "Science": {"topics": ["Algebra"], "cognitiveLevels": ["Recall", "Apply", "Analyze"]}
        }"#,
    )
    .unwrap();
    let ranked = prioritize(&patterns, &catalog);
    for level in CognitiveLevel::ALL {
        let score = |subject: &str| {
            ranked
                .iter()
                .find(|c| c.subject == subject && c.cognitive_level == level)
                .map(|c| c.priority_score)
                .unwrap()
        };
        assert_eq!(score("Science"), 3 * score("Mathematics"));
    }
}

#[test]
fn completing_a_rest_day_slot_is_rejected() {
    let config = PlannerConfig {
        target_sessions_per_week: 0,
        ..PlannerConfig::default()
    };
    let snapshot = build_snapshot(empty_history("resting"), now());
    let (plan, _) = plan_week(&snapshot, &Catalog::builtin(), &config);
    let before = plan.clone();

    let err = set_slot_completion(&plan, 0, 0, true, now()).unwrap_err();
    assert!(matches!(err, PlannerError::OutOfRange { day_index: 0, slot_index: 0 }));
    assert_eq!(plan, before);
}

#[test]
fn avoiding_weekends_caps_saturday_and_sunday() {
    let config = PlannerConfig {
        target_sessions_per_week: 14,
        max_sessions_per_day: 3,
        avoid_weekends: true,
        ..PlannerConfig::default()
    };
    let snapshot = build_snapshot(empty_history("weekday-only"), now());
    let (plan, _) = plan_week(&snapshot, &Catalog::builtin(), &config);
    assert!(plan.days[5].slots.len() <= 1);
    assert!(plan.days[6].slots.len() <= 1);
}

#[test]
fn reflections_drive_session_times() {
    let mut history = empty_history("night-owl");
    history.reflections = vec![
        ReflectionRecord {
            mood: MoodLabel::Excellent,
            fatigue_level: 1,
            time_of_day: "21:40".parse().unwrap(),
            note: Some("late focus".to_string()),
            occurred_at: now() - Duration::days(1),
        },
        ReflectionRecord {
            mood: MoodLabel::Struggling,
            fatigue_level: 5,
            time_of_day: "08:05".parse().unwrap(),
            note: None,
            occurred_at: now() - Duration::days(2),
        },
    ];
    let snapshot = build_snapshot(history, now());
    assert_eq!(
        snapshot.weekly_stats.peak_focus_time.map(|t| t.to_string()),
        Some("21:00".to_string())
    );

    let (plan, _) = plan_week(&snapshot, &Catalog::builtin(), &PlannerConfig::default());
    let times: Vec<String> = plan.days[0].slots.iter().map(|s| s.time.to_string()).collect();
    assert_eq!(times, vec!["21:00", "08:00"]);
}

#[test]
fn identical_inputs_produce_identical_bytes() {
    let mut history = empty_history("steady");
    history.completed_questions = vec![
        answered("English", true, CognitiveLevel::Recall, 10),
        answered("History", false, CognitiveLevel::Analyze, 20),
    ];
    let snapshot = build_snapshot(history, now());
    let render = || {
        let (plan, _) = plan_week(&snapshot, &Catalog::builtin(), &PlannerConfig::default());
        serde_json::to_string(&plan).unwrap()
    };
    assert_eq!(render(), render());
}

#[tokio::test]
async fn stored_plan_round_trip_keeps_totals() {
    let store = Arc::new(InMemoryStore::new());
    store
        .record_question("stu-9", answered("Mathematics", true, CognitiveLevel::Apply, 1))
        .await;
    let planner = Planner::new(
        store.clone(),
        store.clone(),
        Catalog::builtin(),
        PlannerConfig::default(),
    );

    let plan = planner.regenerate("stu-9", now()).await.unwrap();
    let later = now() + Duration::minutes(30);
    let once = planner.complete_slot("stu-9", 1, 0, true, later).await.unwrap();
    let twice = planner.complete_slot("stu-9", 1, 0, true, later).await.unwrap();

    assert_eq!(once, twice);
    assert_eq!(once.total_expected_xp, plan.total_expected_xp);
    assert_eq!(once.total_expected_xp, once.computed_expected_xp());
    assert_eq!(once.last_modified_at, later);

    let stored = store.load_plan("stu-9").await.unwrap();
    assert_eq!(stored, twice);

    let err = planner.complete_slot("stu-9", 9, 0, true, later).await.unwrap_err();
    assert!(matches!(err, PlannerError::OutOfRange { .. }));
}

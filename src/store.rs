//! Store boundaries consumed by the planner.
//!
//! Both traits are object safe so services can hold `Arc<dyn ...>` clients
//! and share them across per-student tasks.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::aggregate;
use crate::error::{PlannerError, PlannerResult};
use crate::models::{
    CompletedQuestionRecord, ReflectionRecord, StudentHistory, StudentProgressSnapshot, StudyPlan,
};
use crate::plan::set_slot_completion;

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Full question and reflection history, oldest first.
    async fn load_history(&self, student_id: &str) -> PlannerResult<StudentHistory>;

    async fn load_snapshot(
        &self,
        student_id: &str,
        now: DateTime<Utc>,
    ) -> PlannerResult<StudentProgressSnapshot> {
        let history = self.load_history(student_id).await?;
        Ok(aggregate::build_snapshot(history, now))
    }
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn load_plan(&self, student_id: &str) -> PlannerResult<StudyPlan>;

    /// Replaces any stored plan for `plan.student_id`. The total is recomputed first.
    async fn save_plan(&self, plan: &StudyPlan) -> PlannerResult<()>;

    async fn update_slot(
        &self,
        student_id: &str,
        day_index: usize,
        slot_index: usize,
        completed: bool,
        now: DateTime<Utc>,
    ) -> PlannerResult<StudyPlan>;
}

/// Process-local store, used by tests and embedded callers.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    histories: RwLock<HashMap<String, StudentHistory>>,
    plans: RwLock<HashMap<String, StudyPlan>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_student(&self, student_id: &str) {
        self.histories
            .write()
            .await
            .entry(student_id.to_string())
            .or_insert_with(|| StudentHistory {
                student_id: student_id.to_string(),
                ..Default::default()
            });
    }

    pub async fn record_question(&self, student_id: &str, record: CompletedQuestionRecord) {
        self.register_student(student_id).await;
        if let Some(history) = self.histories.write().await.get_mut(student_id) {
            history.completed_questions.push(record);
        }
    }

    pub async fn record_reflection(&self, student_id: &str, record: ReflectionRecord) {
        self.register_student(student_id).await;
        if let Some(history) = self.histories.write().await.get_mut(student_id) {
            history.reflections.push(record);
        }
    }

    pub async fn student_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.histories.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl ProgressStore for InMemoryStore {
    async fn load_history(&self, student_id: &str) -> PlannerResult<StudentHistory> {
        self.histories
            .read()
            .await
            .get(student_id)
            .cloned()
            .ok_or_else(|| PlannerError::history_not_found(student_id))
    }
}

#[async_trait]
impl PlanStore for InMemoryStore {
    async fn load_plan(&self, student_id: &str) -> PlannerResult<StudyPlan> {
        self.plans
            .read()
            .await
            .get(student_id)
            .cloned()
            .ok_or_else(|| PlannerError::plan_not_found(student_id))
    }

    async fn save_plan(&self, plan: &StudyPlan) -> PlannerResult<()> {
        let plan = plan.clone().with_recomputed_total();
        self.plans
            .write()
            .await
            .insert(plan.student_id.clone(), plan);
        Ok(())
    }

    async fn update_slot(
        &self,
        student_id: &str,
        day_index: usize,
        slot_index: usize,
        completed: bool,
        now: DateTime<Utc>,
    ) -> PlannerResult<StudyPlan> {
        let mut plans = self.plans.write().await;
        let current = plans
            .get(student_id)
            .ok_or_else(|| PlannerError::plan_not_found(student_id))?;
        let updated = set_slot_completion(current, day_index, slot_index, completed, now)?
            .with_recomputed_total();
        plans.insert(student_id.to_string(), updated.clone());
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::{fixed_now, question};
    use crate::models::{CognitiveLevel, DayPlan, Difficulty, StudySlot};
    use chrono::NaiveDate;

    fn one_slot_plan(student_id: &str) -> StudyPlan {
        let monday = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let mut days: Vec<DayPlan> = (0..7)
            .map(|offset| DayPlan {
                date: monday + chrono::Duration::days(offset),
                slots: vec![],
            })
            .collect();
        days[0].slots.push(StudySlot {
            subject: "Math".to_string(),
            topic: "Algebra".to_string(),
            time: "16:00".parse().unwrap(),
            cognitive_level: CognitiveLevel::Apply,
            expected_xp: 25,
            difficulty: Difficulty::Medium,
            completed: false,
        });
        StudyPlan {
            student_id: student_id.to_string(),
            week_start: monday,
            days,
            total_expected_xp: 0,
            created_at: fixed_now(),
            last_modified_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn unknown_student_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.load_snapshot("ghost", fixed_now()).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.load_plan("ghost").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn snapshot_reflects_recorded_history() {
        let store = InMemoryStore::new();
        store
            .record_question("stu-1", question("Math", true, Some(CognitiveLevel::Recall), 1))
            .await;
        let snapshot = store.load_snapshot("stu-1", fixed_now()).await.unwrap();
        assert_eq!(snapshot.weekly_stats.questions_answered, 1);
        assert_eq!(snapshot.student_id, "stu-1");
    }

    #[tokio::test]
    async fn save_recomputes_total_and_replaces() {
        let store = InMemoryStore::new();
        store.save_plan(&one_slot_plan("stu-1")).await.unwrap();
        let stored = store.load_plan("stu-1").await.unwrap();
        assert_eq!(stored.total_expected_xp, 25);

        let mut replacement = one_slot_plan("stu-1");
        replacement.days[0].slots.clear();
        store.save_plan(&replacement).await.unwrap();
        assert_eq!(store.load_plan("stu-1").await.unwrap().session_count(), 0);
    }

    #[tokio::test]
    async fn update_slot_persists_flag() {
        let store = InMemoryStore::new();
        store.save_plan(&one_slot_plan("stu-1")).await.unwrap();
        let updated = store
            .update_slot("stu-1", 0, 0, true, fixed_now())
            .await
            .unwrap();
        assert!(updated.days[0].slots[0].completed);
        assert!(store.load_plan("stu-1").await.unwrap().days[0].slots[0].completed);
    }

    #[tokio::test]
    async fn update_slot_rejects_bad_indices_without_change() {
        let store = InMemoryStore::new();
        store.save_plan(&one_slot_plan("stu-1")).await.unwrap();
        let err = store
            .update_slot("stu-1", 3, 0, true, fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::OutOfRange { .. }));
        assert_eq!(store.load_plan("stu-1").await.unwrap().completed_count(), 0);

        let missing = store.update_slot("nobody", 0, 0, true, fixed_now()).await;
        assert!(missing.unwrap_err().is_not_found());
    }
}

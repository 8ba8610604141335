use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::aggregate;
use crate::catalog::Catalog;
use crate::config::PlannerConfig;
use crate::error::PlannerResult;
use crate::models::{StudentHistory, StudentProgressSnapshot, StudyPlan};
use crate::patterns::{self, StudyPatterns};
use crate::priority;
use crate::scheduler;
use crate::store::{PlanStore, ProgressStore};

/// Runs analyzer, prioritizer and generator over one snapshot.
///
/// Pure and deterministic: the snapshot's `as_of` is the plan's "now".
pub fn plan_week(
    snapshot: &StudentProgressSnapshot,
    catalog: &Catalog,
    config: &PlannerConfig,
) -> (StudyPlan, StudyPatterns) {
    let patterns = patterns::analyze(snapshot);
    let candidates = priority::prioritize(&patterns, catalog);
    let plan = scheduler::generate_plan(
        &snapshot.student_id,
        &candidates,
        config,
        &patterns.best_times,
        snapshot.as_of,
    );
    (plan, patterns)
}

/// One async mutex per student, serializing regenerations of the same plan.
#[derive(Debug, Default)]
pub struct PlanLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PlanLocks {
    pub async fn acquire(&self, student_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(student_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[derive(Clone)]
pub struct Planner {
    progress: Arc<dyn ProgressStore>,
    plans: Arc<dyn PlanStore>,
    catalog: Arc<Catalog>,
    config: PlannerConfig,
    locks: Arc<PlanLocks>,
}

impl Planner {
    pub fn new(
        progress: Arc<dyn ProgressStore>,
        plans: Arc<dyn PlanStore>,
        catalog: Catalog,
        config: PlannerConfig,
    ) -> Self {
        Self {
            progress,
            plans,
            catalog: Arc::new(catalog),
            config,
            locks: Arc::new(PlanLocks::default()),
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub async fn snapshot(
        &self,
        student_id: &str,
        now: DateTime<Utc>,
    ) -> PlannerResult<StudentProgressSnapshot> {
        self.progress.load_snapshot(student_id, now).await
    }

    /// Loads the student's history, builds a fresh plan and replaces the stored one.
    pub async fn regenerate(&self, student_id: &str, now: DateTime<Utc>) -> PlannerResult<StudyPlan> {
        let _guard = self.locks.acquire(student_id).await;
        let snapshot = self.progress.load_snapshot(student_id, now).await?;
        self.plan_and_save(&snapshot).await
    }

    /// Like [`Planner::regenerate`], but plans from an empty history for unknown students.
    pub async fn regenerate_or_bootstrap(
        &self,
        student_id: &str,
        now: DateTime<Utc>,
    ) -> PlannerResult<StudyPlan> {
        let _guard = self.locks.acquire(student_id).await;
        let snapshot = match self.progress.load_snapshot(student_id, now).await {
            Ok(snapshot) => snapshot,
            Err(err) if err.is_not_found() => {
                tracing::info!(student_id, "no history on record, bootstrapping plan");
                let empty = StudentHistory {
                    student_id: student_id.to_string(),
                    ..Default::default()
                };
                aggregate::build_snapshot(empty, now)
            }
            Err(err) => return Err(err),
        };
        self.plan_and_save(&snapshot).await
    }

    /// Regenerates plans for many students concurrently, one task each.
    ///
    /// Results come back in input order.
    pub async fn regenerate_many(
        &self,
        student_ids: &[String],
        now: DateTime<Utc>,
    ) -> Vec<(String, PlannerResult<StudyPlan>)> {
        let handles: Vec<_> = student_ids
            .iter()
            .map(|student_id| {
                let planner = self.clone();
                let student_id = student_id.clone();
                tokio::spawn(async move {
                    let result = planner.regenerate(&student_id, now).await;
                    (student_id, result)
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(outcome) => results.push(outcome),
                Err(err) => std::panic::resume_unwind(err.into_panic()),
            }
        }
        results
    }

    pub async fn current_plan(&self, student_id: &str) -> PlannerResult<StudyPlan> {
        self.plans.load_plan(student_id).await
    }

    pub async fn complete_slot(
        &self,
        student_id: &str,
        day_index: usize,
        slot_index: usize,
        completed: bool,
        now: DateTime<Utc>,
    ) -> PlannerResult<StudyPlan> {
        let plan = self
            .plans
            .update_slot(student_id, day_index, slot_index, completed, now)
            .await?;
        tracing::info!(
            student_id,
            day_index,
            slot_index,
            completed,
            "updated slot completion"
        );
        Ok(plan)
    }

    async fn plan_and_save(&self, snapshot: &StudentProgressSnapshot) -> PlannerResult<StudyPlan> {
        let (plan, patterns) = plan_week(snapshot, &self.catalog, &self.config);
        tracing::debug!(
            student_id = %plan.student_id,
            weak_subjects = ?patterns.weak_subjects,
            best_times = patterns.best_times.len(),
            "derived study patterns"
        );
        self.plans.save_plan(&plan).await?;
        Ok(plan)
    }
}

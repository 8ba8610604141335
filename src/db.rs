use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::error::{PlannerError, PlannerResult};
use crate::models::{
    CognitiveLevel, CompletedQuestionRecord, MoodLabel, ReflectionRecord, StudentHistory,
    StudyPlan, TimeOfDay,
};
use crate::plan::set_slot_completion;
use crate::store::{PlanStore, ProgressStore};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed progress and plan store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn student_ids(&self) -> PlannerResult<Vec<String>> {
        let rows = sqlx::query("SELECT id FROM study_planner.students ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.try_get("id")?);
        }
        Ok(ids)
    }
}

async fn ensure_student(
    tx: &mut Transaction<'_, Postgres>,
    student_id: &str,
    display_name: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO study_planner.students (id, display_name)
        VALUES ($1, $2)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(student_id)
    .bind(display_name)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn write_plan(tx: &mut Transaction<'_, Postgres>, plan: &StudyPlan) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO study_planner.study_plans
        (student_id, week_start, plan, total_expected_xp, created_at, last_modified_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (student_id) DO UPDATE
        SET week_start = EXCLUDED.week_start,
            plan = EXCLUDED.plan,
            total_expected_xp = EXCLUDED.total_expected_xp,
            created_at = EXCLUDED.created_at,
            last_modified_at = EXCLUDED.last_modified_at
        "#,
    )
    .bind(&plan.student_id)
    .bind(plan.week_start)
    .bind(Json(plan))
    .bind(i64::from(plan.total_expected_xp))
    .bind(plan.created_at)
    .bind(plan.last_modified_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl ProgressStore for PgStore {
    async fn load_history(&self, student_id: &str) -> PlannerResult<StudentHistory> {
        let exists = sqlx::query("SELECT id FROM study_planner.students WHERE id = $1")
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(PlannerError::history_not_found(student_id));
        }

        let question_rows = sqlx::query(
            r#"
            SELECT subject, topic, correct, cognitive_level, xp_awarded, occurred_at, time_spent_secs
            FROM study_planner.completed_questions
            WHERE student_id = $1
            ORDER BY occurred_at, id
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        let mut completed_questions = Vec::with_capacity(question_rows.len());
        for row in question_rows {
            let level: Option<String> = row.try_get("cognitive_level")?;
            let cognitive_level = level.and_then(|raw| match raw.parse::<CognitiveLevel>() {
                Ok(level) => Some(level),
                Err(error) => {
                    tracing::warn!(student_id, %error, "ignoring stored cognitive level");
                    None
                }
            });
            let xp_awarded: i32 = row.try_get("xp_awarded")?;
            let time_spent_secs: Option<i32> = row.try_get("time_spent_secs")?;

            completed_questions.push(CompletedQuestionRecord {
                subject: row.try_get("subject")?,
                topic: row.try_get("topic")?,
                correct: row.try_get("correct")?,
                cognitive_level,
                xp_awarded: u32::try_from(xp_awarded).unwrap_or(0),
                occurred_at: row.try_get("occurred_at")?,
                time_spent_secs: time_spent_secs.and_then(|secs| u32::try_from(secs).ok()),
            });
        }

        let reflection_rows = sqlx::query(
            r#"
            SELECT mood, fatigue_level, time_of_day, note, occurred_at
            FROM study_planner.reflections
            WHERE student_id = $1
            ORDER BY occurred_at, id
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        let mut reflections = Vec::with_capacity(reflection_rows.len());
        for row in reflection_rows {
            let mood: String = row.try_get("mood")?;
            let time_of_day: String = row.try_get("time_of_day")?;
            let (Ok(mood), Ok(time_of_day)) =
                (mood.parse::<MoodLabel>(), time_of_day.parse::<TimeOfDay>())
            else {
                tracing::warn!(student_id, %mood, %time_of_day, "skipping malformed reflection");
                continue;
            };
            let fatigue_level: i16 = row.try_get("fatigue_level")?;

            reflections.push(ReflectionRecord {
                mood,
                fatigue_level: fatigue_level.clamp(1, 5) as u8,
                time_of_day,
                note: row.try_get("note")?,
                occurred_at: row.try_get("occurred_at")?,
            });
        }

        tracing::debug!(
            student_id,
            questions = completed_questions.len(),
            reflections = reflections.len(),
            "loaded progress history"
        );

        Ok(StudentHistory {
            student_id: student_id.to_string(),
            completed_questions,
            reflections,
        })
    }
}

#[async_trait]
impl PlanStore for PgStore {
    async fn load_plan(&self, student_id: &str) -> PlannerResult<StudyPlan> {
        let row = sqlx::query("SELECT plan FROM study_planner.study_plans WHERE student_id = $1")
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PlannerError::plan_not_found(student_id))?;
        let Json(plan): Json<StudyPlan> = row.try_get("plan")?;
        Ok(plan)
    }

    async fn save_plan(&self, plan: &StudyPlan) -> PlannerResult<()> {
        let plan = plan.clone().with_recomputed_total();
        let mut tx = self.pool.begin().await?;
        ensure_student(&mut tx, &plan.student_id, &plan.student_id).await?;
        write_plan(&mut tx, &plan).await?;
        tx.commit().await?;
        tracing::info!(
            student_id = %plan.student_id,
            week_start = %plan.week_start,
            total_expected_xp = plan.total_expected_xp,
            "saved study plan"
        );
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
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "SELECT plan FROM study_planner.study_plans WHERE student_id = $1 FOR UPDATE",
        )
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| PlannerError::plan_not_found(student_id))?;
        let Json(current): Json<StudyPlan> = row.try_get("plan")?;

        let updated = set_slot_completion(&current, day_index, slot_index, completed, now)?
            .with_recomputed_total();
        write_plan(&mut tx, &updated).await?;
        tx.commit().await?;
        Ok(updated)
    }
}

pub async fn seed(pool: &PgPool, now: DateTime<Utc>) -> anyhow::Result<()> {
    let students = vec![
        ("avery-lee", "Avery Lee"),
        ("jules-moreno", "Jules Moreno"),
        ("kiara-patel", "Kiara Patel"),
    ];

    let mut tx = pool.begin().await?;
    for (id, name) in &students {
        ensure_student(&mut tx, id, name).await?;
    }

    // (student, subject, topic, correct, level, days ago)
    let questions = vec![
        ("avery-lee", "Mathematics", "Fractions", false, Some(CognitiveLevel::Recall), 1),
        ("avery-lee", "Mathematics", "Fractions", false, Some(CognitiveLevel::Apply), 2),
        ("avery-lee", "Mathematics", "Algebra", true, Some(CognitiveLevel::Recall), 2),
        ("avery-lee", "Mathematics", "Algebra", false, Some(CognitiveLevel::Apply), 3),
        ("avery-lee", "Science", "Cells", true, Some(CognitiveLevel::Recall), 4),
        ("jules-moreno", "English", "Grammar", true, Some(CognitiveLevel::Recall), 1),
        ("jules-moreno", "English", "Grammar", true, Some(CognitiveLevel::Recall), 2),
        ("jules-moreno", "English", "Essay Writing", true, Some(CognitiveLevel::Apply), 3),
        ("jules-moreno", "History", "World Wars", true, None, 5),
        ("kiara-patel", "Science", "Forces", false, Some(CognitiveLevel::Analyze), 1),
        ("kiara-patel", "Science", "Energy", false, Some(CognitiveLevel::Apply), 2),
        ("kiara-patel", "Science", "Forces", true, Some(CognitiveLevel::Recall), 3),
    ];

    for (index, (student_id, subject, topic, correct, level, days_ago)) in
        questions.into_iter().enumerate()
    {
        let xp = if correct {
            level.map(CognitiveLevel::xp_reward).unwrap_or(10)
        } else {
            0
        };
        sqlx::query(
            r#"
            INSERT INTO study_planner.completed_questions
            (id, student_id, subject, topic, correct, cognitive_level, xp_awarded, occurred_at, time_spent_secs, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(subject)
        .bind(topic)
        .bind(correct)
        .bind(level.map(CognitiveLevel::as_str))
        .bind(xp as i32)
        .bind(now - Duration::days(days_ago))
        .bind(Some(300_i32))
        .bind(format!("seed-q-{index:03}"))
        .execute(&mut *tx)
        .await?;
    }

    let reflections = vec![
        ("avery-lee", MoodLabel::Good, 2, "17:30", "Felt sharp after practice", 1),
        ("avery-lee", MoodLabel::Poor, 4, "21:10", "Too tired for fractions", 2),
        ("jules-moreno", MoodLabel::Excellent, 1, "07:45", "Morning reading went well", 1),
        ("kiara-patel", MoodLabel::Neutral, 3, "19:00", "Physics is confusing", 3),
    ];

    for (index, (student_id, mood, fatigue, time, note, days_ago)) in
        reflections.into_iter().enumerate()
    {
        sqlx::query(
            r#"
            INSERT INTO study_planner.reflections
            (id, student_id, mood, fatigue_level, time_of_day, note, occurred_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(mood.as_str())
        .bind(fatigue as i16)
        .bind(time)
        .bind(note)
        .bind(now - Duration::days(days_ago))
        .bind(format!("seed-r-{index:03}"))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

#[derive(serde::Deserialize)]
struct QuestionCsvRow {
    student_id: String,
    subject: String,
    topic: String,
    correct: bool,
    cognitive_level: Option<String>,
    xp_awarded: u32,
    occurred_at: DateTime<Utc>,
    time_spent_secs: Option<u32>,
    source_key: Option<String>,
}

#[derive(serde::Deserialize)]
struct ReflectionCsvRow {
    student_id: String,
    mood: MoodLabel,
    fatigue_level: u8,
    time_of_day: TimeOfDay,
    note: Option<String>,
    occurred_at: DateTime<Utc>,
    source_key: Option<String>,
}

/// Appends answered questions from CSV. Rows with a known `source_key` are skipped.
pub async fn import_questions_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<QuestionCsvRow>().enumerate() {
        let row = result.with_context(|| format!("bad question row {}", line + 1))?;
        let level = match row.cognitive_level.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<CognitiveLevel>()
                    .map_err(anyhow::Error::msg)
                    .with_context(|| format!("bad question row {}", line + 1))?,
            ),
        };

        ensure_student(&mut tx, &row.student_id, &row.student_id).await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO study_planner.completed_questions
            (id, student_id, subject, topic, correct, cognitive_level, xp_awarded, occurred_at, time_spent_secs, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.student_id)
        .bind(&row.subject)
        .bind(&row.topic)
        .bind(row.correct)
        .bind(level.map(CognitiveLevel::as_str))
        .bind(i32::try_from(row.xp_awarded).context("xp_awarded too large")?)
        .bind(row.occurred_at)
        .bind(row.time_spent_secs.and_then(|secs| i32::try_from(secs).ok()))
        .bind(source_key)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    tx.commit().await?;
    Ok(inserted)
}

pub async fn import_reflections_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<ReflectionCsvRow>().enumerate() {
        let row = result.with_context(|| format!("bad reflection row {}", line + 1))?;
        if !(1..=5).contains(&row.fatigue_level) {
            anyhow::bail!(
                "bad reflection row {}: fatigue_level must be 1-5, got {}",
                line + 1,
                row.fatigue_level
            );
        }

        ensure_student(&mut tx, &row.student_id, &row.student_id).await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO study_planner.reflections
            (id, student_id, mood, fatigue_level, time_of_day, note, occurred_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.student_id)
        .bind(row.mood.as_str())
        .bind(i16::from(row.fatigue_level))
        .bind(row.time_of_day.to_string())
        .bind(&row.note)
        .bind(row.occurred_at)
        .bind(source_key)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    tx.commit().await?;
    Ok(inserted)
}

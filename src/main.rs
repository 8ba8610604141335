use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

use study_planner::config::default_preferred_times;
use study_planner::db::{self, PgStore};
use study_planner::models::{StudyPlan, TimeOfDay};
use study_planner::{logging, patterns, report, Catalog, Planner, PlannerConfig};

#[derive(Parser)]
#[command(name = "study-planner")]
#[command(about = "Personalized weekly study plans from learner progress", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PlanArgs {
    /// Sessions to schedule across the week
    #[arg(long, default_value_t = 12)]
    target_sessions: u32,
    /// Upper bound on sessions per day
    #[arg(long, default_value_t = 3)]
    max_per_day: u32,
    /// Fallback session times (HH:MM), used when no reflections exist
    #[arg(long = "preferred-time")]
    preferred_times: Vec<TimeOfDay>,
    /// At most one session on Saturday and Sunday
    #[arg(long)]
    avoid_weekends: bool,
    /// JSON subject catalog; the built-in catalog is used otherwise
    #[arg(long)]
    catalog: Option<PathBuf>,
}

impl PlanArgs {
    fn config(&self) -> PlannerConfig {
        PlannerConfig {
            target_sessions_per_week: self.target_sessions,
            max_sessions_per_day: self.max_per_day,
            preferred_times: if self.preferred_times.is_empty() {
                default_preferred_times()
            } else {
                self.preferred_times.clone()
            },
            avoid_weekends: self.avoid_weekends,
        }
    }

    fn catalog(&self) -> anyhow::Result<Catalog> {
        match &self.catalog {
            Some(path) => Catalog::load(path),
            None => Ok(Catalog::builtin()),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed learners
    Seed,
    /// Import question and reflection history from CSV files
    Import {
        #[arg(long)]
        questions: Option<PathBuf>,
        #[arg(long)]
        reflections: Option<PathBuf>,
    },
    /// Generate this week's plan for one student
    Plan {
        #[arg(long)]
        student: String,
        /// Plan from an empty history when the student is unknown
        #[arg(long)]
        bootstrap: bool,
        #[command(flatten)]
        settings: PlanArgs,
    },
    /// Generate plans for several students (all known students by default)
    PlanAll {
        #[arg(long = "student")]
        students: Vec<String>,
        #[command(flatten)]
        settings: PlanArgs,
    },
    /// Mark a session complete (or not, with --undo)
    Complete {
        #[arg(long)]
        student: String,
        /// 0 = Monday .. 6 = Sunday
        #[arg(long)]
        day: usize,
        #[arg(long)]
        slot: usize,
        #[arg(long)]
        undo: bool,
    },
    /// Print the stored plan as JSON
    Show {
        #[arg(long)]
        student: String,
    },
    /// Write a markdown report for the stored plan
    Report {
        #[arg(long)]
        student: String,
        #[arg(long, default_value = "plan.md")]
        out: PathBuf,
    },
}

fn print_plan(plan: &StudyPlan) {
    println!(
        "Plan for {} (week of {}): {} sessions, {} XP expected",
        plan.student_id,
        plan.week_start,
        plan.session_count(),
        plan.total_expected_xp
    );
    for day in &plan.days {
        if day.is_rest_day() {
            println!("- {}: rest", day.date.format("%a %Y-%m-%d"));
            continue;
        }
        let sessions: Vec<String> = day
            .slots
            .iter()
            .map(|slot| {
                format!(
                    "{} {} / {} ({})",
                    slot.time, slot.subject, slot.topic, slot.cognitive_level
                )
            })
            .collect();
        println!("- {}: {}", day.date.format("%a %Y-%m-%d"), sessions.join("; "));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging()?;
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = Arc::new(PgStore::new(pool.clone()));
    let now = Utc::now();

    let planner = |settings: &PlanArgs| -> anyhow::Result<Planner> {
        Ok(Planner::new(
            store.clone(),
            store.clone(),
            settings.catalog()?,
            settings.config(),
        ))
    };
    let default_planner = || {
        Planner::new(
            store.clone(),
            store.clone(),
            Catalog::builtin(),
            PlannerConfig::default(),
        )
    };

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool, now).await?;
            println!("Seed data inserted.");
        }
        Commands::Import {
            questions,
            reflections,
        } => {
            if questions.is_none() && reflections.is_none() {
                anyhow::bail!("pass --questions and/or --reflections");
            }
            if let Some(path) = questions {
                let inserted = db::import_questions_csv(&pool, &path).await?;
                println!("Inserted {inserted} questions from {}.", path.display());
            }
            if let Some(path) = reflections {
                let inserted = db::import_reflections_csv(&pool, &path).await?;
                println!("Inserted {inserted} reflections from {}.", path.display());
            }
        }
        Commands::Plan {
            student,
            bootstrap,
            settings,
        } => {
            let planner = planner(&settings)?;
            let plan = if bootstrap {
                planner.regenerate_or_bootstrap(&student, now).await?
            } else {
                planner.regenerate(&student, now).await?
            };
            print_plan(&plan);
        }
        Commands::PlanAll { students, settings } => {
            let planner = planner(&settings)?;
            let students = if students.is_empty() {
                store.student_ids().await?
            } else {
                students
            };
            if students.is_empty() {
                println!("No students found.");
                return Ok(());
            }

            let mut failures = 0usize;
            for (student, result) in planner.regenerate_many(&students, now).await {
                match result {
                    Ok(plan) => println!(
                        "- {}: {} sessions, {} XP expected",
                        student,
                        plan.session_count(),
                        plan.total_expected_xp
                    ),
                    Err(err) => {
                        failures += 1;
                        println!("- {student}: failed ({err})");
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{failures} of {} plans failed", students.len());
            }
        }
        Commands::Complete {
            student,
            day,
            slot,
            undo,
        } => {
            let plan = default_planner()
                .complete_slot(&student, day, slot, !undo, now)
                .await?;
            println!(
                "{} of {} sessions complete for {}.",
                plan.completed_count(),
                plan.session_count(),
                plan.student_id
            );
        }
        Commands::Show { student } => {
            let plan = default_planner()
                .current_plan(&student)
                .await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Commands::Report { student, out } => {
            let planner = default_planner();
            let plan = planner.current_plan(&student).await?;
            let snapshot = planner.snapshot(&student, now).await?;
            let patterns = patterns::analyze(&snapshot);
            let report = report::build_report(&plan, &snapshot, &patterns);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

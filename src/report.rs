use std::fmt::Write;

use crate::models::{StudentProgressSnapshot, StudyPlan};
use crate::patterns::StudyPatterns;

pub fn build_report(
    plan: &StudyPlan,
    snapshot: &StudentProgressSnapshot,
    patterns: &StudyPatterns,
) -> String {
    let mut output = String::new();
    let stats = &snapshot.weekly_stats;

    let _ = writeln!(output, "# Weekly Study Plan");
    let _ = writeln!(
        output,
        "Generated for {} (week of {}, last updated {})",
        plan.student_id,
        plan.week_start,
        plan.last_modified_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Last 7 Days");
    let _ = writeln!(
        output,
        "- {} questions answered, {} correct, {} XP earned",
        stats.questions_answered, stats.correct_answers, stats.total_xp
    );
    let _ = writeln!(output, "- Average mood {:.1} / 5", stats.average_mood);
    match stats.peak_focus_time {
        Some(time) => {
            let _ = writeln!(output, "- Peak focus around {time}");
        }
        None => {
            let _ = writeln!(output, "- No reflections logged this week");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Focus Areas");
    if patterns.weak_subjects.is_empty() {
        let _ = writeln!(output, "No weak subjects detected.");
    } else {
        let subjects: Vec<&str> = patterns.weak_subjects.iter().map(String::as_str).collect();
        let _ = writeln!(output, "- Weak subjects: {}", subjects.join(", "));
    }
    let needs: Vec<String> = patterns
        .cognitive_level_need
        .iter()
        .map(|(level, multiplier)| format!("{level} x{multiplier}"))
        .collect();
    let _ = writeln!(output, "- Practice weighting: {}", needs.join(", "));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Schedule");
    for day in &plan.days {
        let _ = writeln!(output, "### {}", day.date.format("%A %Y-%m-%d"));
        if day.is_rest_day() {
            let _ = writeln!(output, "Rest day.");
            continue;
        }
        for slot in &day.slots {
            let mark = if slot.completed { "x" } else { " " };
            let _ = writeln!(
                output,
                "- [{}] {} {}: {} ({}, {}, {} XP)",
                mark,
                slot.time,
                slot.subject,
                slot.topic,
                slot.cognitive_level,
                slot.difficulty,
                slot.expected_xp
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Progress");
    let _ = writeln!(
        output,
        "- {} of {} sessions complete",
        plan.completed_count(),
        plan.session_count()
    );
    let _ = writeln!(
        output,
        "- {} of {} expected XP earned",
        plan.earned_xp(),
        plan.total_expected_xp
    );

    output
}

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Local time of day, always rendered as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for TimeOfDay {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M").map(Self)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CognitiveLevel {
    Recall,
    Apply,
    Analyze,
}

impl CognitiveLevel {
    pub const ALL: [CognitiveLevel; 3] = [Self::Recall, Self::Apply, Self::Analyze];

    pub fn xp_reward(self) -> u32 {
        match self {
            Self::Recall => 15,
            Self::Apply => 25,
            Self::Analyze => 40,
        }
    }

    pub fn difficulty(self) -> Difficulty {
        match self {
            Self::Recall => Difficulty::Easy,
            Self::Apply => Difficulty::Medium,
            Self::Analyze => Difficulty::Hard,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recall => "Recall",
            Self::Apply => "Apply",
            Self::Analyze => "Analyze",
        }
    }
}

impl fmt::Display for CognitiveLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CognitiveLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recall" => Ok(Self::Recall),
            "apply" => Ok(Self::Apply),
            "analyze" => Ok(Self::Analyze),
            other => Err(format!("unknown cognitive level '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoodLabel {
    Excellent,
    Good,
    Neutral,
    Poor,
    Struggling,
}

impl MoodLabel {
    pub fn score(self) -> u32 {
        match self {
            Self::Excellent => 5,
            Self::Good => 4,
            Self::Neutral => 3,
            Self::Poor => 2,
            Self::Struggling => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Neutral => "neutral",
            Self::Poor => "poor",
            Self::Struggling => "struggling",
        }
    }
}

impl FromStr for MoodLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "excellent" => Ok(Self::Excellent),
            "good" => Ok(Self::Good),
            "neutral" => Ok(Self::Neutral),
            "poor" => Ok(Self::Poor),
            "struggling" => Ok(Self::Struggling),
            other => Err(format!("unknown mood label '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedQuestionRecord {
    pub subject: String,
    pub topic: String,
    pub correct: bool,
    pub cognitive_level: Option<CognitiveLevel>,
    pub xp_awarded: u32,
    pub occurred_at: DateTime<Utc>,
    pub time_spent_secs: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionRecord {
    pub mood: MoodLabel,
    /// 1 (fresh) to 5 (exhausted).
    pub fatigue_level: u8,
    pub time_of_day: TimeOfDay,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Raw history as returned by a progress store, before aggregation.
#[derive(Debug, Clone, Default)]
pub struct StudentHistory {
    pub student_id: String,
    pub completed_questions: Vec<CompletedQuestionRecord>,
    pub reflections: Vec<ReflectionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyStatsSnapshot {
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub total_xp: u32,
    pub average_mood: f64,
    pub peak_focus_time: Option<TimeOfDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgressSnapshot {
    pub student_id: String,
    pub total_xp: u32,
    pub completed_questions: Vec<CompletedQuestionRecord>,
    pub reflections: Vec<ReflectionRecord>,
    pub weekly_stats: WeeklyStatsSnapshot,
    pub subject_weaknesses: BTreeSet<String>,
    pub cognitive_level_coverage: BTreeMap<CognitiveLevel, u32>,
    /// Reference instant the trailing window was measured from.
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySlot {
    pub subject: String,
    pub topic: String,
    pub time: TimeOfDay,
    pub cognitive_level: CognitiveLevel,
    pub expected_xp: u32,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    pub date: NaiveDate,
    pub slots: Vec<StudySlot>,
}

impl DayPlan {
    pub fn is_rest_day(&self) -> bool {
        self.slots.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlan {
    pub student_id: String,
    pub week_start: NaiveDate,
    pub days: Vec<DayPlan>,
    pub total_expected_xp: u32,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
}

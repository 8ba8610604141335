use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::models::CognitiveLevel;

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSubject {
    pub name: String,
    pub topics: Vec<String>,
    pub cognitive_levels: Vec<CognitiveLevel>,
}

/// Static subject table. Iteration order is the order subjects were listed in.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub subjects: Vec<CatalogSubject>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubjectEntry {
    topics: Vec<String>,
    cognitive_levels: Vec<CognitiveLevel>,
}

const DEFAULT_CATALOG: &[(&str, &[&str])] = &[
    (
        "Mathematics",
        &["Algebra", "Geometry", "Fractions", "Statistics"],
    ),
    ("Science", &["Forces", "Cells", "Chemical Reactions", "Energy"]),
    (
        "English",
        &["Reading Comprehension", "Grammar", "Essay Writing"],
    ),
    ("History", &["Ancient Civilizations", "World Wars"]),
];

impl Catalog {
    pub fn builtin() -> Self {
        let subjects = DEFAULT_CATALOG
            .iter()
            .map(|(name, topics)| CatalogSubject {
                name: name.to_string(),
                topics: topics.iter().map(|topic| topic.to_string()).collect(),
                cognitive_levels: CognitiveLevel::ALL.to_vec(),
            })
            .collect();
        Self { subjects }
    }

    /// Parses `{subject: {"topics": [...], "cognitiveLevels": [...]}}`, keeping key order.
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let table: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(raw).context("catalog must be a JSON object")?;

        let mut subjects = Vec::with_capacity(table.len());
        for (name, value) in table {
            let entry: SubjectEntry = serde_json::from_value(value)
                .with_context(|| format!("invalid catalog entry for '{name}'"))?;
            subjects.push(CatalogSubject {
                name,
                topics: entry.topics,
                cognitive_levels: entry.cognitive_levels,
            });
        }

        Ok(Self { subjects })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let catalog = Self::from_json(&raw)?;
        tracing::info!(
            path = %path.display(),
            subjects = catalog.subjects.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn subject(&self, name: &str) -> Option<&CatalogSubject> {
        self.subjects.iter().find(|subject| subject.name == name)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

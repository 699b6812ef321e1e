use serde::{Deserialize, Serialize};

/// A single scored bullet under a criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionItem {
    pub description: String,
    pub max_score: f64,
}

/// A scoring dimension (e.g. "Content") with its maximum score and items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criterion {
    /// Display order, 1-based. 0 means "derive from position".
    pub index: u64,
    pub title: String,
    pub max_score: f64,
    pub items: Vec<CriterionItem>,
}

/// A rendered, self-contained template for one criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionTemplate {
    pub title: String,
    pub prompt: String,
    pub max_score: f64,
}

/// Everything the parser extracts from a combined template document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTemplate {
    pub instructions: String,
    pub criteria: Vec<Criterion>,
    pub question_title: String,
    pub question_bullets: Vec<String>,
    pub answer: String,
}

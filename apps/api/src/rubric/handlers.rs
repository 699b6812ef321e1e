//! Axum route handlers for rubric templates.

use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::errors::AppError;
use crate::routes::fields::FormFields;
use crate::rubric::builder::build_criterion_templates;
use crate::rubric::defaults::default_b1_criteria;
use crate::rubric::models::{Criterion, CriterionTemplate};

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub count: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        Self {
            count: data.len(),
            data,
        }
    }
}

/// POST /api/prompt
///
/// Takes a combined template in the `message` field (or the raw body) and
/// returns one template per criterion.
pub async fn handle_build_templates(
    fields: FormFields,
) -> Result<Json<ListResponse<CriterionTemplate>>, AppError> {
    let raw = fields
        .message()
        .ok_or_else(|| AppError::Validation("missing raw template content".to_string()))?;

    let templates = build_criterion_templates(&raw)?;
    info!(count = templates.len(), "split template into per-criterion prompts");

    Ok(Json(templates.into()))
}

/// GET /api/criteria/default
///
/// Returns the built-in B1 rubric.
pub async fn handle_default_criteria() -> Json<ListResponse<Criterion>> {
    Json(default_b1_criteria().into())
}

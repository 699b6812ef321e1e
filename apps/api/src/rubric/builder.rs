//! Template Builder — renders one standalone template document per criterion.

use std::fmt::Write as _;

use thiserror::Error;
use tracing::debug;

use crate::rubric::models::{Criterion, CriterionTemplate, ParsedTemplate};
use crate::rubric::parser::parse_template;

#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    #[error("no criteria parsed")]
    NoCriteria,
}

/// Parses `raw` and builds one template per criterion, ordered by index.
pub fn build_criterion_templates(raw: &str) -> Result<Vec<CriterionTemplate>, TemplateError> {
    build_from_parsed(&parse_template(raw))
}

/// Builds per-criterion templates from an already parsed document.
///
/// Criteria are ordered by their explicit index, falling back to their
/// 1-based position when the index is 0. The sort is stable, so duplicate
/// keys keep document order.
pub fn build_from_parsed(parsed: &ParsedTemplate) -> Result<Vec<CriterionTemplate>, TemplateError> {
    if parsed.criteria.is_empty() {
        return Err(TemplateError::NoCriteria);
    }

    let bullets: Vec<&str> = parsed
        .question_bullets
        .iter()
        .map(|b| normalize_bullet(b))
        .filter(|b| !b.is_empty())
        .collect();

    let mut ordered: Vec<(u64, &Criterion)> = parsed
        .criteria
        .iter()
        .enumerate()
        .map(|(position, criterion)| {
            let order = match criterion.index {
                0 => position as u64 + 1,
                index => index,
            };
            (order, criterion)
        })
        .collect();
    ordered.sort_by_key(|(order, _)| *order);

    let templates: Vec<CriterionTemplate> = ordered
        .into_iter()
        .map(|(order, criterion)| CriterionTemplate {
            title: criterion.title.clone(),
            prompt: render_template(parsed, &bullets, order, criterion),
            max_score: criterion.max_score,
        })
        .collect();

    debug!(count = templates.len(), "built criterion templates");
    Ok(templates)
}

fn render_template(
    parsed: &ParsedTemplate,
    bullets: &[&str],
    order: u64,
    criterion: &Criterion,
) -> String {
    let mut out = String::new();

    out.push_str("===INSTRUCTIONS===\n");
    out.push_str(parsed.instructions.trim());
    out.push_str("\n===CRITERIA===\n");
    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        "CRITERIA {order}: {} (0-{} marks)",
        criterion.title,
        format_score(criterion.max_score)
    );
    for item in &criterion.items {
        let _ = writeln!(
            out,
            "- {}  (0-{} marks)",
            item.description,
            format_score(item.max_score)
        );
    }

    out.push_str("===QUESTION===\n");
    if !parsed.question_title.is_empty() {
        out.push_str(&parsed.question_title);
        out.push('\n');
    }
    for bullet in bullets {
        let _ = writeln!(out, "• {bullet}");
    }

    out.push_str("===ANSWER===\n");
    out.push_str(&parsed.answer);
    out
}

fn normalize_bullet(bullet: &str) -> &str {
    bullet
        .trim()
        .trim_start_matches(|c: char| matches!(c, '•' | '-' | '*' | ' ' | '\t'))
}

/// Formats a score without a trailing `.0`: `2.0 -> "2"`, `1.50 -> "1.5"`,
/// `1.25 -> "1.25"`. Non-integers are rounded to two decimals.
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 && score.is_finite() {
        // f64's Display never uses an exponent or a trailing `.0`.
        return format!("{score}");
    }
    let fixed = format!("{score:.2}");
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

//! Template Parser — splits a combined evaluation document into its sections.
//!
//! The document is delimited by four marker lines:
//! `===INSTRUCTIONS===`, `===CRITERIA===`, `===QUESTION===`, `===ANSWER===`.
//! Parsing is permissive: malformed lines are dropped and unparseable numbers
//! become 0, so callers detect insufficient input by checking for an empty
//! criteria list.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::rubric::models::{Criterion, CriterionItem, ParsedTemplate};

/// `CRITERIA 1: Content (0-5 marks)`
static CRITERION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^CRITERIA\s+([0-9]+):\s+(.*?)\s*\((?:0-)?([0-9]+(?:\.[0-9]+)?)\s+marks?\)\s*$")
        .expect("criterion header pattern is valid")
});

/// `- Is it about the topic?  (0-1 marks)`
static CRITERION_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-\s+(.*?)\s*\((?:0-)?([0-9]+(?:\.[0-9]+)?)\s+marks?\)\s*$")
        .expect("criterion item pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Instructions,
    Criteria,
    Question,
    Answer,
}

impl Section {
    fn from_marker(line: &str) -> Option<Self> {
        match line {
            "===INSTRUCTIONS===" => Some(Section::Instructions),
            "===CRITERIA===" => Some(Section::Criteria),
            "===QUESTION===" => Some(Section::Question),
            "===ANSWER===" => Some(Section::Answer),
            _ => None,
        }
    }
}

/// Parses a raw combined template. Never fails; see module docs.
pub fn parse_template(raw: &str) -> ParsedTemplate {
    let mut section = Section::Preamble;
    let mut instructions = String::new();
    let mut answer = String::new();
    let mut criteria: Vec<Criterion> = Vec::new();
    let mut current: Option<Criterion> = None;
    let mut question_title = String::new();
    let mut question_bullets: Vec<String> = Vec::new();

    for raw_line in raw.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        let trimmed = line.trim();

        if let Some(next) = Section::from_marker(trimmed) {
            section = next;
            continue;
        }

        if trimmed.is_empty() {
            match section {
                Section::Instructions => instructions.push('\n'),
                Section::Answer => answer.push('\n'),
                _ => {}
            }
            continue;
        }

        match section {
            Section::Preamble => {}
            Section::Instructions => {
                if !instructions.is_empty() {
                    instructions.push('\n');
                }
                instructions.push_str(trimmed);
            }
            Section::Criteria => {
                if let Some(caps) = CRITERION_HEADER.captures(trimmed) {
                    if let Some(done) = current.take() {
                        criteria.push(done);
                    }
                    current = Some(Criterion {
                        index: parse_index(&caps[1]),
                        title: caps[2].to_string(),
                        max_score: parse_score(&caps[3]),
                        items: Vec::new(),
                    });
                } else if let Some(caps) = CRITERION_ITEM.captures(trimmed) {
                    // Items before the first header have nowhere to go.
                    if let Some(open) = current.as_mut() {
                        open.items.push(CriterionItem {
                            description: caps[1].to_string(),
                            max_score: parse_score(&caps[2]),
                        });
                    }
                }
            }
            Section::Question => {
                if !is_bullet(trimmed) && question_title.is_empty() {
                    question_title = trimmed.to_string();
                } else {
                    question_bullets.push(strip_bullet(trimmed));
                }
            }
            Section::Answer => {
                if !answer.is_empty() {
                    answer.push('\n');
                }
                answer.push_str(line);
            }
        }
    }

    if let Some(done) = current {
        criteria.push(done);
    }

    ParsedTemplate {
        instructions: instructions.trim().to_string(),
        criteria,
        question_title,
        question_bullets,
        answer: answer.trim().to_string(),
    }
}

fn is_bullet(line: &str) -> bool {
    line.starts_with('•') || line.starts_with('-') || line.starts_with('*')
}

/// Removes a leading bullet marker. Lines without one (a second non-bullet
/// line in the QUESTION section) are kept verbatim.
fn strip_bullet(line: &str) -> String {
    if let Some(rest) = line.strip_prefix('•') {
        rest.trim().to_string()
    } else if line.starts_with('-') || line.starts_with('*') {
        line.trim_start_matches(|c: char| matches!(c, '-' | '*' | ' '))
            .trim()
            .to_string()
    } else {
        line.to_string()
    }
}

/// Best-effort: anything unparseable (including overflow) is 0.
fn parse_index(text: &str) -> u64 {
    text.parse().unwrap_or(0)
}

/// Best-effort: anything unparseable is 0.
fn parse_score(text: &str) -> f64 {
    text.parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "===INSTRUCTIONS===\nInstr line 1\n===CRITERIA===\nCRITERIA 1: Content (0-5 marks)\n===QUESTION===\nSample Question\n• Bullet one\n• Bullet two\n===ANSWER===\nquery\n";

    #[test]
    fn test_parses_all_five_sections() {
        let parsed = parse_template(SAMPLE);
        assert_eq!(parsed.instructions, "Instr line 1");
        assert_eq!(parsed.criteria.len(), 1);
        assert_eq!(parsed.criteria[0].title, "Content");
        assert_eq!(parsed.criteria[0].index, 1);
        assert!((parsed.criteria[0].max_score - 5.0).abs() < f64::EPSILON);
        assert!(parsed.criteria[0].items.is_empty());
        assert_eq!(parsed.question_title, "Sample Question");
        assert_eq!(parsed.question_bullets, vec!["Bullet one", "Bullet two"]);
        assert_eq!(parsed.answer, "query");
    }

    #[test]
    fn test_counts_criteria_and_items() {
        let raw = "===CRITERIA===\n\
            CRITERIA 1: Content (0-5 marks)\n\
            - Is it on topic? (0-1 marks)\n\
            - Are the notes addressed? (0-2 marks)\n\
            - Appropriate length? (0-2 marks)\n\
            CRITERIA 2: Organization (0-4 marks)\n\
            - Logical order? (0-1.5 marks)\n\
            CRITERIA 3: Language (3 marks)\n";
        let parsed = parse_template(raw);
        assert_eq!(parsed.criteria.len(), 3);
        assert_eq!(parsed.criteria[0].items.len(), 3);
        assert_eq!(parsed.criteria[1].items.len(), 1);
        assert!(parsed.criteria[2].items.is_empty());
        assert!((parsed.criteria[1].max_score - 4.0).abs() < f64::EPSILON);
        assert!((parsed.criteria[1].items[0].max_score - 1.5).abs() < f64::EPSILON);
        assert!((parsed.criteria[2].max_score - 3.0).abs() < f64::EPSILON);
        assert_eq!(parsed.criteria[0].items[1].description, "Are the notes addressed?");
    }

    #[test]
    fn test_singular_mark_and_crlf() {
        let raw = "===CRITERIA===\r\nCRITERIA 4: Spelling (0-1 mark)\r\n- Accurate? (0-1 mark)\r\n";
        let parsed = parse_template(raw);
        assert_eq!(parsed.criteria.len(), 1);
        assert_eq!(parsed.criteria[0].title, "Spelling");
        assert_eq!(parsed.criteria[0].items[0].description, "Accurate?");
    }

    #[test]
    fn test_items_before_first_header_are_dropped() {
        let raw = "===CRITERIA===\n- Orphan (0-1 marks)\nnot a criterion\nCRITERIA 1: A (0-2 marks)\n";
        let parsed = parse_template(raw);
        assert_eq!(parsed.criteria.len(), 1);
        assert!(parsed.criteria[0].items.is_empty());
    }

    #[test]
    fn test_overflowing_index_degrades_to_zero() {
        let raw = "===CRITERIA===\nCRITERIA 99999999999999999999999: Huge (0-2 marks)\n";
        let parsed = parse_template(raw);
        assert_eq!(parsed.criteria[0].index, 0);
        assert_eq!(parsed.criteria[0].title, "Huge");
    }

    #[test]
    fn test_large_index_is_kept() {
        let raw = "===CRITERIA===\nCRITERIA 5000000000: Big (0-2 marks)\n";
        let parsed = parse_template(raw);
        assert_eq!(parsed.criteria[0].index, 5_000_000_000);
    }

    #[test]
    fn test_instructions_keep_single_paragraph_break() {
        let raw = "===INSTRUCTIONS===\n\n  First paragraph  \n\nSecond paragraph\n\n===CRITERIA===\n";
        let parsed = parse_template(raw);
        assert_eq!(parsed.instructions, "First paragraph\n\nSecond paragraph");
    }

    #[test]
    fn test_answer_keeps_blank_lines_and_indentation() {
        let raw = "===ANSWER===\n\nDear Sam,\n\n    I am fine.\nBye\n\n";
        let parsed = parse_template(raw);
        assert_eq!(parsed.answer, "Dear Sam,\n\n    I am fine.\nBye");
    }

    #[test]
    fn test_question_bullet_markers_are_stripped() {
        let raw = "===QUESTION===\nWrite an email\n- dash bullet\n* star bullet\n•no space\n";
        let parsed = parse_template(raw);
        assert_eq!(parsed.question_title, "Write an email");
        assert_eq!(
            parsed.question_bullets,
            vec!["dash bullet", "star bullet", "no space"]
        );
    }

    #[test]
    fn test_second_question_line_becomes_bullet() {
        let raw = "===QUESTION===\nFirst title line\nSecond title line\n• real bullet\n";
        let parsed = parse_template(raw);
        assert_eq!(parsed.question_title, "First title line");
        assert_eq!(
            parsed.question_bullets,
            vec!["Second title line", "real bullet"]
        );
    }

    #[test]
    fn test_text_before_any_marker_is_ignored() {
        let raw = "stray header\nCRITERIA 1: Ghost (0-2 marks)\n===ANSWER===\nhello";
        let parsed = parse_template(raw);
        assert!(parsed.criteria.is_empty());
        assert_eq!(parsed.answer, "hello");
    }

    #[test]
    fn test_markers_match_after_trimming() {
        let raw = "   ===CRITERIA===   \nCRITERIA 1: Content (0-5 marks)\n";
        let parsed = parse_template(raw);
        assert_eq!(parsed.criteria.len(), 1);
    }

    #[test]
    fn test_empty_input_yields_empty_document() {
        assert_eq!(parse_template(""), ParsedTemplate::default());
    }
}

use crate::rubric::models::{Criterion, CriterionItem};

fn item(description: &str, max_score: f64) -> CriterionItem {
    CriterionItem {
        description: description.to_string(),
        max_score,
    }
}

/// The reference B1 writing rubric: three criteria worth 5 marks each.
pub fn default_b1_criteria() -> Vec<Criterion> {
    vec![
        Criterion {
            index: 1,
            title: "Content".to_string(),
            max_score: 5.0,
            items: vec![
                item("Is it about the topic stated in the task?", 1.0),
                item(
                    "Does it address all the notes mentioned in the task? Or does it answer the question(s) in the task?",
                    2.0,
                ),
                item("Are the answers of an appropriate length for the task?", 2.0),
            ],
        },
        Criterion {
            index: 2,
            title: "Communicative Achievement & Organization".to_string(),
            max_score: 5.0,
            items: vec![
                item(
                    "Does the text use appropriate language and phrases to respond to all the notes?",
                    2.0,
                ),
                item("Are the ideas presented in a logical order?", 1.0),
                item(
                    "Does the text use a variety of linking words or cohesive devices (such as although, and, but, because, so that, whether etc., and referencing language)?",
                    1.0,
                ),
                item(
                    "Is the purpose of the answer clear (e.g., agreeing, disagreeing, giving opinion, explaining)?",
                    1.0,
                ),
            ],
        },
        Criterion {
            index: 3,
            title: "Language Grammar and Vocabulary".to_string(),
            max_score: 5.0,
            items: vec![
                item("Does the text use a range of vocabulary?", 1.5),
                item(
                    "Does the text use simple grammar accurately (e.g., basic tenses and simple clauses)?",
                    1.0,
                ),
                item(
                    "Does it use some complex grammatical structures (such as relative clauses, passives, modal forms and tense contrasts)?",
                    1.5,
                ),
                item("Is the spelling accurate enough for the meaning to be clear?", 1.0),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_structure() {
        let criteria = default_b1_criteria();
        assert_eq!(criteria.len(), 3);
        assert_eq!(criteria[0].title, "Content");
        let indices: Vec<u64> = criteria.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn test_total_max_score_is_fifteen() {
        let total: f64 = default_b1_criteria().iter().map(|c| c.max_score).sum();
        assert!((total - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_items_sum_to_criterion_max() {
        for criterion in default_b1_criteria() {
            let items: f64 = criterion.items.iter().map(|i| i.max_score).sum();
            assert!(
                (items - criterion.max_score).abs() < f64::EPSILON,
                "{} items sum to {items}",
                criterion.title
            );
        }
    }
}

//! Grading Engine. Pure functions over the frozen question ids, the stored
//! answers and the live catalog's correctness flags.

use std::collections::HashMap;

use crate::models::{
    question::QuestionWithOptions,
    submission::{Answers, QuestionOutcome},
};

/// Per-question outcomes for `presented` (frozen order), in that order.
///
/// A question missing from `catalog`, or one with zero or several correct
/// options, cannot be answered correctly but still counts toward the total.
pub fn breakdown(
    presented: &[i64],
    catalog: &[QuestionWithOptions],
    answers: &Answers,
) -> Vec<QuestionOutcome> {
    let correct: HashMap<i64, Option<i64>> =
        catalog.iter().map(|q| (q.id(), q.correct_option_id())).collect();

    presented
        .iter()
        .map(|&question_id| {
            let selected = answers.get(&question_id).copied();
            let correct_option = correct.get(&question_id).copied().flatten();
            QuestionOutcome {
                question_id,
                selected_option_id: selected,
                correct_option_id: correct_option,
                is_answered: selected.is_some(),
                is_correct: selected.is_some() && selected == correct_option,
            }
        })
        .collect()
}

/// Percentage of correct outcomes; `0.0` when nothing was presented.
pub fn score(outcomes: &[QuestionOutcome]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    let correct = outcomes.iter().filter(|o| o.is_correct).count();
    correct as f64 / outcomes.len() as f64 * 100.0
}

pub fn grade(presented: &[i64], catalog: &[QuestionWithOptions], answers: &Answers) -> f64 {
    score(&breakdown(presented, catalog, answers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{AnswerOption, Question};

    fn q(id: i64, options: &[(i64, bool)]) -> QuestionWithOptions {
        let now = chrono::Utc::now();
        QuestionWithOptions {
            question: Question {
                id,
                quiz_id: 1,
                content: String::new(),
                order_index: 0,
                created_at: now,
                updated_at: now,
            },
            options: options
                .iter()
                .enumerate()
                .map(|(i, &(oid, is_correct))| AnswerOption {
                    id: oid,
                    question_id: id,
                    content: String::new(),
                    is_correct,
                    order_index: i as i32,
                })
                .collect(),
        }
    }

    #[test]
    fn one_of_two_correct_is_fifty() {
        let catalog = vec![
            q(1, &[(1, true), (2, false), (5, false)]),
            q(2, &[(3, false), (4, true), (6, false)]),
        ];
        let answers = Answers::from([(1, 1), (2, 3)]);
        assert_eq!(grade(&[1, 2], &catalog, &answers), 50.0);
    }

    #[test]
    fn nothing_presented_scores_zero() {
        assert_eq!(grade(&[], &[], &Answers::new()), 0.0);
    }

    #[test]
    fn missing_answers_are_wrong_not_errors() {
        let catalog = vec![q(1, &[(1, true), (2, false), (3, false)])];
        let outcomes = breakdown(&[1], &catalog, &Answers::new());
        assert!(!outcomes[0].is_answered);
        assert!(!outcomes[0].is_correct);
        assert_eq!(outcomes[0].correct_option_id, Some(1));
        assert_eq!(score(&outcomes), 0.0);
    }

    #[test]
    fn ambiguous_or_unset_key_is_unsatisfiable() {
        let catalog = vec![
            q(1, &[(1, true), (2, true), (3, false)]),
            q(2, &[(4, false), (5, false), (6, false)]),
        ];
        let answers = Answers::from([(1, 1), (2, 4)]);
        let outcomes = breakdown(&[1, 2], &catalog, &answers);
        assert!(outcomes.iter().all(|o| !o.is_correct && o.correct_option_id.is_none()));
        assert_eq!(score(&outcomes), 0.0);
    }

    #[test]
    fn only_presented_questions_count() {
        let catalog = vec![
            q(1, &[(1, true), (2, false), (3, false)]),
            q(2, &[(4, true), (5, false), (6, false)]),
            q(3, &[(7, true), (8, false), (9, false)]),
        ];
        let answers = Answers::from([(1, 1), (3, 8)]);
        assert_eq!(grade(&[1], &catalog, &answers), 100.0);
    }

    #[test]
    fn deleted_question_stays_in_denominator() {
        let catalog = vec![q(1, &[(1, true), (2, false), (3, false)])];
        let answers = Answers::from([(1, 1), (2, 4)]);
        assert_eq!(grade(&[1, 2], &catalog, &answers), 50.0);
    }

    #[test]
    fn option_from_another_question_is_just_wrong() {
        let catalog = vec![
            q(1, &[(1, true), (2, false), (3, false)]),
            q(2, &[(4, true), (5, false), (6, false)]),
        ];
        let answers = Answers::from([(1, 4)]);
        assert_eq!(grade(&[1, 2], &catalog, &answers), 0.0);
    }
}

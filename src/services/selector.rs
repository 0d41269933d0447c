//! Question Selector.
//!
//! Decides which questions an attempt shows and in what order, and
//! reproduces that decision from the frozen snapshot on every later read.

use std::collections::HashMap;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::models::{
    question::{AnswerOption, QuestionWithOptions},
    quiz::Quiz,
    submission::{OptionOrders, OptionSlot, QuestionSlot},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionConfig {
    /// `None` selects the whole pool.
    pub questions_per_quiz: Option<usize>,
    pub randomize_questions: bool,
    pub randomize_options: bool,
    /// Author review: whole pool, `order_index` order, no randomization.
    pub full_pool: bool,
}

impl SelectionConfig {
    pub fn for_quiz(quiz: &Quiz, is_admin: bool) -> Self {
        Self {
            questions_per_quiz: quiz.questions_per_quiz.map(|n| n.max(0) as usize),
            randomize_questions: quiz.randomize_questions,
            randomize_options: quiz.randomize_options,
            full_pool: is_admin,
        }
    }
}

/// Questions in presentation order, each with its options in presentation
/// order, plus the snapshot that reproduces them.
#[derive(Debug, Clone)]
pub struct ResolvedView {
    pub questions: Vec<QuestionWithOptions>,
    pub question_order: Vec<QuestionSlot>,
    pub option_orders: OptionOrders,
}

impl ResolvedView {
    fn from_ordered(questions: Vec<QuestionWithOptions>) -> Self {
        let question_order = questions
            .iter()
            .enumerate()
            .map(|(i, q)| QuestionSlot { question_id: q.id(), order_index: i as i32 })
            .collect();
        let option_orders = questions
            .iter()
            .map(|q| {
                let slots = q
                    .options
                    .iter()
                    .enumerate()
                    .map(|(i, o)| OptionSlot { option_id: o.id, order_index: i as i32 })
                    .collect();
                (q.id(), slots)
            })
            .collect();
        Self { questions, question_order, option_orders }
    }
}

/// Resolves the view for one attempt.
///
/// With an existing `question_order` the stored view is replayed verbatim:
/// the pool is filtered to the snapshot ids and returned in snapshot order,
/// and the snapshot itself is handed back unchanged. Questions deleted since
/// the snapshot are skipped, and questions added since never appear (an
/// empty snapshot stays empty). Otherwise a fresh view is drawn from `pool`.
pub fn resolve_view<R: Rng + ?Sized>(
    config: &SelectionConfig,
    existing_order: Option<&[QuestionSlot]>,
    existing_option_orders: Option<&OptionOrders>,
    pool: &[QuestionWithOptions],
    rng: &mut R,
) -> ResolvedView {
    match existing_order {
        Some(order) => ResolvedView {
            questions: replay(order, existing_option_orders, pool),
            question_order: order.to_vec(),
            option_orders: existing_option_orders.cloned().unwrap_or_default(),
        },
        None => ResolvedView::from_ordered(fresh(config, pool, rng)),
    }
}

fn by_order_index(options: &mut [AnswerOption]) {
    options.sort_by_key(|o| (o.order_index, o.id));
}

fn fresh<R: Rng + ?Sized>(
    config: &SelectionConfig,
    pool: &[QuestionWithOptions],
    rng: &mut R,
) -> Vec<QuestionWithOptions> {
    let mut selected: Vec<QuestionWithOptions> = pool.to_vec();

    if config.full_pool {
        selected.sort_by_key(|q| (q.question.order_index, q.id()));
        for q in &mut selected {
            by_order_index(&mut q.options);
        }
        return selected;
    }

    if let Some(n) = config.questions_per_quiz {
        if n < selected.len() {
            selected = selected.choose_multiple(rng, n).cloned().collect();
        }
    }

    if config.randomize_questions {
        selected.shuffle(rng);
    } else {
        selected.sort_by_key(|q| (q.question.order_index, q.id()));
    }

    for q in &mut selected {
        if config.randomize_options {
            q.options.shuffle(rng);
        } else {
            by_order_index(&mut q.options);
        }
    }
    selected
}

/// Filters `pool` to a frozen snapshot, in snapshot order.
pub fn replay(
    order: &[QuestionSlot],
    option_orders: Option<&OptionOrders>,
    pool: &[QuestionWithOptions],
) -> Vec<QuestionWithOptions> {
    let by_id: HashMap<i64, &QuestionWithOptions> = pool.iter().map(|q| (q.id(), q)).collect();

    let mut slots = order.to_vec();
    slots.sort_by_key(|s| s.order_index);

    slots
        .iter()
        .filter_map(|slot| by_id.get(&slot.question_id))
        .map(|q| {
            let mut q = (*q).clone();
            match option_orders.and_then(|o| o.get(&q.id())) {
                Some(frozen) => {
                    let mut frozen = frozen.clone();
                    frozen.sort_by_key(|s| s.order_index);
                    let mut live: HashMap<i64, AnswerOption> =
                        q.options.drain(..).map(|o| (o.id, o)).collect();
                    q.options = frozen.iter().filter_map(|s| live.remove(&s.option_id)).collect();
                }
                None => by_order_index(&mut q.options),
            }
            q
        })
        .collect()
}

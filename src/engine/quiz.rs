use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    api::RewardApi,
    config::{settings::QuizSettings, AnswerPolicyKind},
    models::{QuizQuestion, Session},
    utils::Pacer,
};

/// Decides which option index to submit for a question.
pub trait AnswerPolicy: Send + Sync {
    fn choose(&self, question: &QuizQuestion) -> usize;
}

/// Always answers the same option.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedAnswer(pub usize);

impl AnswerPolicy for FixedAnswer {
    fn choose(&self, _question: &QuizQuestion) -> usize {
        self.0
    }
}

/// Picks uniformly among the offered options.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformRandom;

impl AnswerPolicy for UniformRandom {
    fn choose(&self, question: &QuizQuestion) -> usize {
        if question.options.is_empty() {
            return 0;
        }
        rand::thread_rng().gen_range(0..question.options.len())
    }
}

pub fn policy_from_settings(settings: &QuizSettings) -> Arc<dyn AnswerPolicy> {
    match settings.answer_policy {
        AnswerPolicyKind::Fixed => Arc::new(FixedAnswer(settings.fixed_choice)),
        AnswerPolicyKind::Random => Arc::new(UniformRandom),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuizState {
    Ready(u32),
    Answering { remaining: u32, question: QuizQuestion },
    /// All chances used
    Done,
    /// A remote call failed; remaining chances are left for the next pass
    Aborted,
}

impl QuizState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QuizState::Done | QuizState::Aborted)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizOutcome {
    pub state: QuizState,
    pub submitted: u32,
    pub correct: u32,
    pub points: f64,
}

pub struct QuizEngine {
    api: Arc<dyn RewardApi>,
    policy: Arc<dyn AnswerPolicy>,
    pacer: Pacer,
}

impl QuizEngine {
    pub fn new(api: Arc<dyn RewardApi>, policy: Arc<dyn AnswerPolicy>, pacer: Pacer) -> Self {
        Self { api, policy, pacer }
    }

    /// Spend `chances` quiz attempts, one question at a time.
    pub async fn run(&self, session: &Session, chances: u32) -> QuizOutcome {
        let mut outcome = QuizOutcome {
            state: QuizState::Ready(chances),
            submitted: 0,
            correct: 0,
            points: 0.0,
        };

        if chances == 0 {
            warn!("No chances left for the quiz");
        } else {
            info!("Starting quiz with {} chances", chances);
        }

        while !outcome.state.is_terminal() {
            let state = std::mem::replace(&mut outcome.state, QuizState::Aborted);
            let next = self.step(session, state, &mut outcome).await;
            outcome.state = next;
        }

        outcome
    }

    /// Perform a single transition.
    pub async fn step(&self, session: &Session, state: QuizState, outcome: &mut QuizOutcome) -> QuizState {
        match state {
            QuizState::Ready(0) => QuizState::Done,
            QuizState::Ready(remaining) => match self.api.get_question(session).await {
                Ok(question) => {
                    info!("Question: {}", question.text);
                    info!("Options: {}", question.options.join(" | "));
                    QuizState::Answering { remaining, question }
                }
                Err(e) => {
                    warn!("Could not fetch a question, abandoning {} chances: {}", remaining, e);
                    QuizState::Aborted
                }
            },
            QuizState::Answering { remaining, question } => {
                let choice = self.policy.choose(&question);
                match self.api.submit_answer(session, choice).await {
                    Ok(result) => {
                        outcome.submitted += 1;
                        if result.correct {
                            outcome.correct += 1;
                            outcome.points += result.points_awarded;
                            info!("Correct answer, earned {} points", result.points_awarded);
                        } else {
                            info!("Wrong answer");
                        }

                        let remaining = remaining.saturating_sub(1);
                        info!("{} chances left", remaining);
                        self.pacer.pause().await;
                        QuizState::Ready(remaining)
                    }
                    Err(e) => {
                        warn!("Could not submit answer, abandoning {} chances: {}", remaining, e);
                        QuizState::Aborted
                    }
                }
            }
            terminal => terminal,
        }
    }
}

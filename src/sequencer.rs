use crate::errors::AnswerError;
use crate::models::{CheckinConfig, ConditionalRule, Question, Response, ShowIfValue};
use crate::store::ResponseStore;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Ask(Question),
    Done,
}

/// Walks the config's questions in order, skipping the ones whose condition is
/// not met and the ones already answered.
#[derive(Debug, Clone)]
pub struct QuestionSequencer {
    config: Arc<CheckinConfig>,
    cursor: usize,
    presented: Option<u64>,
}

impl QuestionSequencer {
    pub fn new(config: Arc<CheckinConfig>) -> Self {
        Self::with_cursor(config, 0)
    }

    pub fn with_cursor(config: Arc<CheckinConfig>, cursor: usize) -> Self {
        Self {
            config,
            cursor,
            presented: None,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.config.questions.len()
    }

    /// Id of the question waiting for an answer, if one has been presented.
    pub fn presented(&self) -> Option<u64> {
        self.presented
    }

    pub fn advance(&mut self, responses: &ResponseStore) -> Step {
        while let Some(question) = self.config.questions.get(self.cursor) {
            if !should_show_question(question, responses) {
                debug!(
                    question_id = question.id,
                    "skipping question, condition not met"
                );
                self.cursor += 1;
                continue;
            }
            if responses.contains(question.id) {
                self.cursor += 1;
                continue;
            }

            self.presented = Some(question.id);
            return Step::Ask(question.clone());
        }

        self.presented = None;
        Step::Done
    }

    pub fn record_answer(
        &mut self,
        responses: &mut ResponseStore,
        question_id: u64,
        response: Response,
    ) -> Result<(), AnswerError> {
        let question = match (self.presented, self.config.questions.get(self.cursor)) {
            (Some(presented), Some(question)) if presented == question.id => question,
            _ => return Err(AnswerError::NoPendingQuestion),
        };
        if question.id != question_id {
            return Err(AnswerError::NotCurrentQuestion {
                expected: question.id,
                got: question_id,
            });
        }

        match (&response, question.question_type.takes_options()) {
            (Response::Text(text), false) if text.trim().is_empty() => {
                return Err(AnswerError::Empty);
            }
            (Response::Text(_), false) => {}
            (Response::Value(_), false) => return Err(AnswerError::ExpectedText(question_id)),
            (Response::Text(_), true) => return Err(AnswerError::ExpectedOption(question_id)),
            (Response::Value(option), true) => {
                if !question.options.iter().any(|candidate| candidate == option) {
                    return Err(AnswerError::UnknownOption {
                        question_id,
                        option: option.clone(),
                    });
                }
            }
        }

        responses.insert(question_id, response);
        self.cursor += 1;
        self.presented = None;
        Ok(())
    }

    /// Cursor for progress that arrives without one: just past the last
    /// answered question.
    pub fn cursor_after_last_answered(&self, answered: &[u64]) -> usize {
        self.config
            .questions
            .iter()
            .rposition(|question| answered.contains(&question.id))
            .map_or(0, |index| index + 1)
    }
}

/// Decodes the question's raw conditional logic. `Ok(None)` means the question
/// is unconditional.
pub fn conditional_rule(question: &Question) -> Result<Option<ConditionalRule>, serde_json::Error> {
    match &question.conditional_logic {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(encoded)) if encoded.trim().is_empty() => Ok(None),
        Some(Value::String(encoded)) => serde_json::from_str(encoded).map(Some),
        Some(value) => serde_json::from_value(value.clone()).map(Some),
    }
}

pub fn should_show_question(question: &Question, responses: &ResponseStore) -> bool {
    let rule = match conditional_rule(question) {
        Ok(Some(rule)) => rule,
        Ok(None) => return true,
        Err(err) => {
            warn!(
                question_id = question.id,
                "invalid conditional logic, showing question: {err}"
            );
            return true;
        }
    };

    let Some(depends_on) = rule.depends_on_question_id.filter(|id| *id != 0) else {
        return true;
    };
    let Some(previous) = responses.get(depends_on) else {
        return false;
    };

    let answer = previous.as_str();
    match &rule.show_if_value {
        Some(ShowIfValue::Any(values)) => values.iter().any(|value| value == answer),
        Some(ShowIfValue::One(value)) if !value.is_empty() => value == answer,
        _ => true,
    }
}

use crate::models::{Question, Response};
use crate::store::ResponseStore;
use serde::{Deserialize, Serialize};

pub const COMPLETION_MESSAGE: &str =
    "Obrigado pelo seu feedback! Seu check-in foi salvo com sucesso.";
pub const TEXT_PLACEHOLDER: &str = "Digite sua resposta...";
pub const OPTIONS_PLACEHOLDER: &str = "Selecione uma opção acima...";
pub const FINISHED_PLACEHOLDER: &str = "Check-in finalizado";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Bot,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatEntry {
    Message {
        sender: Sender,
        text: String,
    },
    Options {
        question_id: u64,
        options: Vec<String>,
        enabled: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputState {
    pub enabled: bool,
    pub placeholder: String,
}

/// The chat transcript and the state of the free-text input. Pages only ever
/// project this model; nothing is read back from them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatRenderer {
    entries: Vec<ChatEntry>,
    input: InputState,
    completed: bool,
}

impl ChatRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn add_message(&mut self, sender: Sender, text: impl Into<String>) {
        self.entries.push(ChatEntry::Message {
            sender,
            text: text.into(),
        });
    }

    fn add_options(&mut self, question: &Question, enabled: bool) {
        if !question.question_type.takes_options() || question.options.is_empty() {
            return;
        }
        self.entries.push(ChatEntry::Options {
            question_id: question.id,
            options: question.options.clone(),
            enabled,
        });
    }

    /// Appends the question/answer pairs of every answered question, in
    /// question order.
    pub fn replay(&mut self, questions: &[Question], responses: &ResponseStore, answered: &[u64]) {
        for question in questions.iter().filter(|q| answered.contains(&q.id)) {
            self.add_message(Sender::Bot, question.question_text.as_str());
            self.add_options(question, false);
            if let Some(response) = responses.get(question.id) {
                self.add_message(Sender::User, response.as_str());
            }
        }
    }

    pub fn show_question(&mut self, question: &Question) {
        self.add_message(Sender::Bot, question.question_text.as_str());
        if question.question_type.takes_options() {
            self.set_input(false, OPTIONS_PLACEHOLDER);
            self.add_options(question, true);
        } else {
            self.set_input(true, TEXT_PLACEHOLDER);
        }
    }

    /// Locks every answer affordance so a question cannot be answered twice.
    pub fn lock_answers(&mut self) {
        for entry in &mut self.entries {
            if let ChatEntry::Options { enabled, .. } = entry {
                *enabled = false;
            }
        }
        self.input.enabled = false;
    }

    pub fn show_answer(&mut self, response: &Response) {
        self.add_message(Sender::User, response.as_str());
    }

    pub fn show_completion(&mut self) {
        self.add_message(Sender::Bot, COMPLETION_MESSAGE);
        self.lock_answers();
        self.set_input(false, FINISHED_PLACEHOLDER);
        self.completed = true;
    }

    fn set_input(&mut self, enabled: bool, placeholder: &str) {
        self.input = InputState {
            enabled,
            placeholder: placeholder.to_string(),
        };
    }
}

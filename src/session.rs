use crate::errors::{AnswerError, GatewayError};
use crate::gateway::{SubmissionGateway, SubmissionRequest};
use crate::models::{CheckinConfig, CheckinView, Response, SubmissionStatus, SubmitResponse};
use crate::persistence::{Progress, ProgressPersistence};
use crate::renderer::ChatRenderer;
use crate::sequencer::{should_show_question, QuestionSequencer, Step};
use crate::store::ResponseStore;
use chrono::NaiveDate;
use std::{collections::BTreeMap, sync::Arc};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{error, info, warn};

/// The server's one open check-in, if any.
pub type SessionSlot = Arc<Mutex<Option<CheckinSession>>>;

const GENERIC_FAILURE: &str = "Erro ao completar check-in. Tente novamente.";

/// Where a session's earlier answers came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Restored {
    Fresh,
    Local(Progress),
    Remote {
        responses: BTreeMap<u64, Response>,
        answered: Vec<u64>,
    },
}

/// Local storage first, then the backend; anything unusable starts fresh.
pub async fn restore_progress(
    persistence: &ProgressPersistence,
    gateway: &dyn SubmissionGateway,
) -> Restored {
    if let Some(progress) = persistence.load() {
        if !progress.responses.is_empty() {
            return Restored::Local(progress);
        }
    }

    match gateway.load_progress(persistence.config_id()).await {
        Ok(remote) if remote.success => {
            let responses = remote.responses();
            if responses.is_empty() {
                return Restored::Fresh;
            }
            // Ids without a stored answer would be replayed as bare prompts.
            let answered: Vec<u64> = remote
                .answered_questions
                .into_iter()
                .filter(|id| responses.contains_key(id))
                .collect();
            let answered = if answered.is_empty() {
                responses.keys().copied().collect()
            } else {
                answered
            };
            Restored::Remote {
                responses,
                answered,
            }
        }
        Ok(_) => Restored::Fresh,
        Err(err) => {
            warn!("failed to load check-in progress from backend: {err}");
            Restored::Fresh
        }
    }
}

/// One run of the check-in conversation, from opening to submission.
pub struct CheckinSession {
    config: Arc<CheckinConfig>,
    sequencer: QuestionSequencer,
    responses: ResponseStore,
    answered: Vec<u64>,
    renderer: ChatRenderer,
    persistence: ProgressPersistence,
    submission: SubmissionStatus,
    accepted_week: Option<NaiveDate>,
}

impl CheckinSession {
    /// Builds the session and renders it: earlier answers are replayed, then
    /// the next question (or the completion) is shown. A returned request must
    /// be handed to [`spawn_submission`].
    pub fn open(
        config: Arc<CheckinConfig>,
        persistence: ProgressPersistence,
        restored: Restored,
    ) -> (Self, Option<SubmissionRequest>) {
        let sequencer = QuestionSequencer::new(Arc::clone(&config));
        let (responses, answered, cursor) = match restored {
            Restored::Fresh => (ResponseStore::new(), Vec::new(), 0),
            Restored::Local(progress) => {
                let responses = ResponseStore::from_map(progress.responses);
                let answered = responses.answered_ids();
                (responses, answered, progress.cursor)
            }
            Restored::Remote {
                responses,
                answered,
            } => {
                let cursor = sequencer.cursor_after_last_answered(&answered);
                (ResponseStore::from_map(responses), answered, cursor)
            }
        };
        let sequencer = QuestionSequencer::with_cursor(Arc::clone(&config), cursor);

        let mut session = Self {
            config,
            sequencer,
            responses,
            answered,
            renderer: ChatRenderer::new(),
            persistence,
            submission: SubmissionStatus::NotStarted,
            accepted_week: None,
        };
        let request = if session.answered.is_empty() {
            session.render_next_question()
        } else {
            session.restore_from_progress()
        };
        (session, request)
    }

    pub fn responses(&self) -> &ResponseStore {
        &self.responses
    }

    pub fn submission(&self) -> &SubmissionStatus {
        &self.submission
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.submission, SubmissionStatus::Accepted { .. })
    }

    /// In flight, or accepted during the current week. Such a session is shown
    /// as-is on reopen instead of starting over.
    pub fn is_pinned(&self) -> bool {
        match self.submission {
            SubmissionStatus::InFlight => true,
            SubmissionStatus::Accepted { .. } => {
                self.accepted_week == Some(self.persistence.current_week())
            }
            _ => false,
        }
    }

    /// Redraws the transcript from the stored answers, then continues.
    pub fn restore_from_progress(&mut self) -> Option<SubmissionRequest> {
        self.renderer.clear();
        self.renderer
            .replay(&self.config.questions, &self.responses, &self.answered);

        let settled = self.config.questions.iter().all(|question| {
            self.answered.contains(&question.id)
                || !should_show_question(question, &self.responses)
        });
        if self.sequencer.is_exhausted() || settled {
            self.finish()
        } else {
            self.render_next_question()
        }
    }

    pub fn render_next_question(&mut self) -> Option<SubmissionRequest> {
        match self.sequencer.advance(&self.responses) {
            Step::Ask(question) => {
                self.renderer.show_question(&question);
                None
            }
            Step::Done => self.finish(),
        }
    }

    pub fn select_option(
        &mut self,
        question_id: u64,
        option: &str,
    ) -> Result<Option<SubmissionRequest>, AnswerError> {
        self.answer(question_id, Response::value(option))
    }

    pub fn send_text(
        &mut self,
        question_id: u64,
        text: &str,
    ) -> Result<Option<SubmissionRequest>, AnswerError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AnswerError::Empty);
        }
        self.answer(question_id, Response::text(text))
    }

    fn answer(
        &mut self,
        question_id: u64,
        response: Response,
    ) -> Result<Option<SubmissionRequest>, AnswerError> {
        self.sequencer
            .record_answer(&mut self.responses, question_id, response.clone())?;

        self.renderer.lock_answers();
        self.renderer.show_answer(&response);
        self.answered.push(question_id);
        self.persistence
            .schedule_save(&self.responses, self.sequencer.cursor());

        Ok(self.render_next_question())
    }

    fn finish(&mut self) -> Option<SubmissionRequest> {
        if !self.renderer.is_completed() {
            self.renderer.show_completion();
        }
        if self.submission != SubmissionStatus::NotStarted {
            return None;
        }

        self.submission = SubmissionStatus::InFlight;
        Some(SubmissionRequest {
            config_id: self.config.id,
            responses: self.responses.to_records(),
        })
    }

    pub fn complete_submission(&mut self, result: Result<SubmitResponse, GatewayError>) {
        self.submission = match result {
            Ok(reply) if reply.success => {
                self.persistence.clear();
                let points_awarded = reply.points_awarded.unwrap_or(0);
                self.accepted_week = Some(self.persistence.current_week());
                info!(
                    config_id = self.config.id,
                    points_awarded,
                    new_total_points = ?reply.new_total_points,
                    "check-in completed"
                );
                SubmissionStatus::Accepted {
                    points_awarded,
                    new_total_points: reply.new_total_points,
                }
            }
            Ok(reply) => {
                let message = reply
                    .message
                    .unwrap_or_else(|| "Erro desconhecido".to_string());
                error!(config_id = self.config.id, "check-in rejected: {message}");
                self.persistence
                    .save(&self.responses, self.sequencer.cursor());
                SubmissionStatus::Failed {
                    message: format!("Erro ao completar check-in: {message}"),
                }
            }
            Err(err) => {
                error!(config_id = self.config.id, "check-in submission failed: {err}");
                self.persistence
                    .save(&self.responses, self.sequencer.cursor());
                SubmissionStatus::Failed {
                    message: GENERIC_FAILURE.to_string(),
                }
            }
        };
    }

    /// Ignored unless this session is the one waiting on a reply.
    fn settle(&mut self, config_id: u64, result: Result<SubmitResponse, GatewayError>) {
        if self.config.id != config_id || self.submission != SubmissionStatus::InFlight {
            warn!(config_id, "dropping submission result for a session that moved on");
            return;
        }
        self.complete_submission(result);
    }

    /// Saves progress right away so the check-in can be resumed later.
    pub fn close(&self) {
        if self.responses.is_empty() || self.is_accepted() {
            return;
        }
        self.persistence
            .save(&self.responses, self.sequencer.cursor());
        info!(config_id = self.config.id, "check-in progress saved on close");
    }

    pub fn view(&self) -> CheckinView {
        CheckinView {
            config_id: self.config.id,
            title: self.config.title.clone(),
            messages: self.renderer.entries().to_vec(),
            input: self.renderer.input().clone(),
            current_question: self.sequencer.presented(),
            completed: self.renderer.is_completed(),
            submission: self.submission.clone(),
        }
    }
}

/// Sends the check-in on its own task, so a caller that goes away cannot
/// cancel it. The slot is only locked again once the backend has replied.
pub fn spawn_submission(
    slot: SessionSlot,
    gateway: Arc<dyn SubmissionGateway>,
    request: SubmissionRequest,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = gateway.submit(&request).await;
        match slot.lock().await.as_mut() {
            Some(session) => session.settle(request.config_id, result),
            None => warn!(
                config_id = request.config_id,
                "check-in closed before the backend replied"
            ),
        }
    })
}

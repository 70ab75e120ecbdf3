use crate::errors::AppError;
use crate::models::{AnswerRequest, CheckinView};
use crate::session::{restore_progress, spawn_submission, CheckinSession};
use crate::state::AppState;
use crate::ui::render_index;
use axum::{extract::State, http::StatusCode, response::Html, Json};
use std::sync::Arc;

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let title = state
        .checkin
        .as_ref()
        .and_then(|checkin| checkin.title.as_deref());
    Html(render_index(title))
}

pub async fn get_checkin(State(state): State<AppState>) -> Result<Json<CheckinView>, AppError> {
    let slot = state.session.lock().await;
    let session = slot
        .as_ref()
        .ok_or_else(|| AppError::not_found("no check-in open"))?;
    Ok(Json(session.view()))
}

pub async fn open_checkin(State(state): State<AppState>) -> Result<Json<CheckinView>, AppError> {
    let checkin = state
        .checkin
        .clone()
        .ok_or_else(|| AppError::not_found("no check-in available"))?;

    {
        let mut slot = state.session.lock().await;
        if let Some(existing) = slot.as_ref().filter(|session| session.is_pinned()) {
            return Ok(Json(existing.view()));
        }
        if let Some(existing) = slot.take() {
            existing.close();
        }
    }

    // The backend may be slow; nothing is locked while it answers.
    let persistence = state.persistence(checkin.id);
    let restored = restore_progress(&persistence, state.gateway.as_ref()).await;

    let mut slot = state.session.lock().await;
    if let Some(existing) = slot.as_ref() {
        return Ok(Json(existing.view()));
    }
    let (session, request) = CheckinSession::open(checkin, persistence, restored);
    let view = session.view();
    *slot = Some(session);
    if let Some(request) = request {
        spawn_submission(Arc::clone(&state.session), Arc::clone(&state.gateway), request);
    }
    Ok(Json(view))
}

pub async fn answer(
    State(state): State<AppState>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<CheckinView>, AppError> {
    let mut slot = state.session.lock().await;
    let session = slot
        .as_mut()
        .ok_or_else(|| AppError::not_found("no check-in open"))?;

    let request = match (payload.text.as_deref(), payload.value.as_deref()) {
        (Some(text), None) => session.send_text(payload.question_id, text)?,
        (None, Some(value)) => session.select_option(payload.question_id, value)?,
        _ => {
            return Err(AppError::bad_request(
                "exactly one of 'text' or 'value' is required",
            ))
        }
    };
    let view = session.view();
    if let Some(request) = request {
        spawn_submission(Arc::clone(&state.session), Arc::clone(&state.gateway), request);
    }
    Ok(Json(view))
}

pub async fn close_checkin(State(state): State<AppState>) -> StatusCode {
    let mut slot = state.session.lock().await;
    // A pinned check-in stays put so reopening shows the result.
    if slot.as_ref().is_some_and(|session| !session.is_pinned()) {
        if let Some(session) = slot.take() {
            session.close();
        }
    }
    StatusCode::NO_CONTENT
}

use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::GenerateError;
use crate::gemini::AltTextService;
use crate::image_intake::ImageAsset;
use crate::session::{Phase, Session, SessionError};

const INDEX_HTML: &str = include_str!("../templates/index.html");

pub struct AppState {
    pub service: AltTextService,
    pub session: tokio::sync::Mutex<Session>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct GenerateResponse {
    alt_text: String,
    keywords: Vec<String>,
    length: usize,
    limit: u32,
    within_limit: bool,
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorResponse { error: message.to_string() })).into_response()
}

pub async fn index_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn handle_generate(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut bytes = None;
    let mut max_chars = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => match field.name().map(|name| name.to_string()).as_deref() {
                Some("file") => match field.bytes().await {
                    Ok(data) => {
                        bytes = Some(data);
                    }
                    Err(err) => {
                        return json_error(
                            StatusCode::BAD_REQUEST,
                            &format!("Falha ao ler o arquivo: {err}"),
                        );
                    }
                },
                Some("max_chars") => match field.text().await {
                    Ok(text) => {
                        max_chars = text.trim().parse::<u32>().ok();
                    }
                    Err(err) => {
                        return json_error(
                            StatusCode::BAD_REQUEST,
                            &format!("Falha ao ler o formulário: {err}"),
                        );
                    }
                },
                _ => {}
            },
            Ok(None) => break,
            Err(err) => {
                return json_error(
                    StatusCode::BAD_REQUEST,
                    &format!("Falha ao ler o formulário: {err}"),
                );
            }
        }
    }

    let request = {
        let mut session = state.session.lock().await;
        if let Some(data) = bytes {
            if !matches!(session.phase(), Phase::Requesting) {
                match ImageAsset::from_bytes(data.to_vec()) {
                    Ok(asset) => {
                        if let Ok((width, height)) = asset.dimensions() {
                            info!(width, height, mime_type = %asset.mime_type, "image selected");
                        }
                        session.select_image(asset);
                    }
                    Err(err) => {
                        return json_error(
                            StatusCode::BAD_REQUEST,
                            &format!("Formato de imagem não suportado: {err}"),
                        );
                    }
                }
            }
        }
        if let Some(limit) = max_chars {
            session.set_char_limit(limit);
        }
        match session.begin_request() {
            Ok(request) => request,
            Err(err @ SessionError::NoImage) => {
                return json_error(StatusCode::BAD_REQUEST, err.user_message());
            }
            Err(err @ SessionError::RequestOutstanding) => {
                return json_error(StatusCode::CONFLICT, err.user_message());
            }
        }
    };

    // The session lock is not held across the remote call; the `Requesting`
    // phase alone guards against a second trigger.
    let outcome = state.service.generate(&request).await;

    let mut session = state.session.lock().await;
    match outcome {
        Ok(result) => {
            let check = session.limit_check(&result);
            info!(length = check.length, limit = check.limit, "alt text generated");
            let body = GenerateResponse {
                alt_text: result.description.clone(),
                keywords: result.keywords.clone(),
                length: check.length,
                limit: check.limit,
                within_limit: check.within,
            };
            session.complete(result);
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => {
            warn!(error = %err, "alt text generation failed");
            let message = err.user_message();
            session.fail(message);
            let status = match err {
                GenerateError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
                GenerateError::Service(_) | GenerateError::ResponseFormat(_) => {
                    StatusCode::BAD_GATEWAY
                }
            };
            json_error(status, message)
        }
    }
}

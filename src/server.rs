use axum::{
    Form, Json, Router,
    body::{Body, to_bytes},
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::commands::{Command, rejection_message};
use crate::monitor::Monitor;
use crate::shutdown::Shutdown;
use crate::signature::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
    pub shutdown: Shutdown,
}

/// Form fields of a slash-command request; everything else is ignored.
#[derive(Deserialize, Debug)]
pub struct SlashCommand {
    pub channel_id: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Serialize, Debug)]
pub struct SlashResponse {
    pub response_type: &'static str,
    pub text: String,
}

impl SlashResponse {
    fn in_channel(text: String) -> Self {
        Self {
            response_type: "in_channel",
            text,
        }
    }
}

pub fn router(state: AppState, signing_secret: String) -> Router {
    let commands = Router::new()
        .route("/", post(dispatch))
        .route_layer(middleware::from_fn_with_state(
            Arc::new(signing_secret),
            verify_signature,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(commands)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn dispatch(
    State(state): State<AppState>,
    Form(request): Form<SlashCommand>,
) -> Json<SlashResponse> {
    let text = match Command::parse(&request.text) {
        Ok(command) => {
            command
                .execute(&state.monitor, &request.channel_id, &state.shutdown)
                .await
        }
        Err(e) => {
            tracing::warn!(channel_id = %request.channel_id, text = %request.text, error = %e, "Rejected command");
            rejection_message(&e)
        }
    };
    Json(SlashResponse::in_channel(text))
}

/// Rejects requests whose signature does not match the shared signing secret.
async fn verify_signature(
    State(secret): State<Arc<String>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE)?;

    let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());
    if let Err(e) = signature::verify(
        &secret,
        header(TIMESTAMP_HEADER),
        header(SIGNATURE_HEADER),
        &bytes,
        Utc::now().timestamp(),
    ) {
        tracing::warn!(error = %e, "Invalid request signature");
        return Err(StatusCode::UNAUTHORIZED);
    }

    // Body was consumed for hashing; hand the handler a fresh one.
    let req = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(req).await)
}

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::warn;

use super::download::serve_artifact;
use crate::base_system::context::{ENV_EMAIL, ENV_PASSWORD};
use crate::base_system::credentials::CredentialOverrides;
use crate::download::error::PipelineError;
use crate::download::models::RequestInput;
use crate::ui::web::state::AppState;

const URL_FIELD: &str = "jnovelclub_url";
const PARTS_FIELD: &str = "prepub_parts";

/// `GET|POST /epub`. Fields come from the query string, then from headers.
pub(crate) async fn api_epub(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let field = |name: &str| -> Option<String> {
        query.get(name).cloned().or_else(|| {
            headers
                .get(name.to_ascii_lowercase().as_str())
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
    };

    let input = RequestInput {
        jnovelclub_url: field(URL_FIELD),
        prepub_parts: field(PARTS_FIELD),
        overrides: CredentialOverrides {
            email: field(ENV_EMAIL),
            password: field(ENV_PASSWORD),
        },
    };

    let result = match state.pipeline.run(input).await {
        Ok(served) => serve_artifact(served).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(resp) => resp,
        Err(err) => api_error(&err),
    }
}

fn api_error(err: &PipelineError) -> Response {
    warn!(target: "web", error = %err, status = err.status().as_u16(), "api request failed");
    (err.status(), Json(json!({ "message": err.user_message() }))).into_response()
}

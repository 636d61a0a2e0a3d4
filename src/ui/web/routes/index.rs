use axum::Form;
use axum::extract::State;
use axum::extract::rejection::FormRejection;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use tracing::warn;

use super::download::serve_artifact;
use crate::download::error::PipelineError;
use crate::download::models::RequestInput;
use crate::ui::web::state::AppState;
use crate::ui::web::templates;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EpubForm {
    #[serde(default)]
    pub(crate) jnovelclub_url: String,
    #[serde(default)]
    pub(crate) prepub_parts: String,
}

pub(crate) async fn index() -> Response {
    page(StatusCode::OK, templates::render_index("", "", None))
}

/// Form submission: the file as a download, or the form again with the error.
pub(crate) async fn submit(
    State(state): State<AppState>,
    form: Result<Form<EpubForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            warn!(target: "web", error = %rejection, "unreadable form submission");
            return page(
                rejection.status(),
                templates::render_index("", "", Some(&rejection.body_text())),
            );
        }
    };

    let input = RequestInput {
        jnovelclub_url: Some(form.jnovelclub_url.clone()),
        prepub_parts: Some(form.prepub_parts.clone()),
        ..RequestInput::default()
    };

    let result = match state.pipeline.run(input).await {
        Ok(served) => serve_artifact(served).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(resp) => resp,
        Err(err) => form_error(&form, &err),
    }
}

fn form_error(form: &EpubForm, err: &PipelineError) -> Response {
    warn!(target: "web", error = %err, "form request failed");
    page(
        err.status(),
        templates::render_index(
            &form.jnovelclub_url,
            &form.prepub_parts,
            Some(&err.user_message()),
        ),
    )
}

fn page(status: StatusCode, html: String) -> Response {
    let mut resp = (status, Html(html)).into_response();
    resp.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
    resp.headers_mut()
        .insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    resp.headers_mut()
        .insert(header::EXPIRES, HeaderValue::from_static("0"));
    resp
}

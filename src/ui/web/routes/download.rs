use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::Response;
use tokio_util::io::ReaderStream;

use crate::base_system::file_cleaner::WorkDir;
use crate::download::error::PipelineError;
use crate::download::models::ServableResponse;

fn make_content_disposition(filename: &str) -> Option<header::HeaderValue> {
    // RFC 5987 filename* for UTF-8 names, plus ASCII fallback for legacy clients.
    fn is_unreserved(b: u8) -> bool {
        b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_')
    }

    let mut encoded = String::with_capacity(filename.len() * 3);
    for &b in filename.as_bytes() {
        if is_unreserved(b) {
            encoded.push(char::from(b));
        } else {
            encoded.push('%');
            encoded.push_str(&format!("{b:02X}"));
        }
    }

    let ascii_fallback = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();

    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii_fallback, encoded
    );
    header::HeaderValue::from_str(&value).ok()
}

/// Streams the artifact and releases the working directory when the body is
/// dropped, after the last chunk or on client disconnect.
pub(crate) async fn serve_artifact(served: ServableResponse) -> Result<Response, PipelineError> {
    let ServableResponse {
        path,
        media_type,
        filename,
        workdir,
    } = served;

    let file = tokio::fs::File::open(&path).await?;
    let length = file.metadata().await?.len();
    let stream = ArtifactStream {
        _workdir: workdir,
        inner: ReaderStream::new(file),
    };

    let mut resp = Response::new(Body::from_stream(stream));
    *resp.status_mut() = StatusCode::OK;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(media_type),
    );
    resp.headers_mut()
        .insert(header::CONTENT_LENGTH, header::HeaderValue::from(length));
    if let Some(hv) = make_content_disposition(&filename) {
        resp.headers_mut().insert(header::CONTENT_DISPOSITION, hv);
    }

    Ok(resp)
}

struct ArtifactStream {
    _workdir: WorkDir,
    inner: ReaderStream<tokio::fs::File>,
}

impl futures_core::Stream for ArtifactStream {
    type Item = Result<axum::body::Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

//! Caption request dispatcher.
//!
//! One multipart POST per explicit user action. No retry, no timeout, no
//! cancellation: a second dispatch is prevented only by the loading flag.

use reqwest::multipart;
use serde::Deserialize;
use tauri::AppHandle;

use crate::state::{SelectedImage, SharedState};

/// The captioning service is an external collaborator on a fixed local port.
pub const CAPTION_ENDPOINT: &str = "http://127.0.0.1:8000/generate-caption";

/// Shown in place of a caption when the service answers without one. This is
/// rendered as a successful result, not an error.
pub const FALLBACK_CAPTION: &str = "⚠️ Failed to generate a caption.";

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no image selected")]
    NoImage,
    #[error("a caption request is already in flight")]
    InFlight,
    #[error("caption request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct CaptionResponse {
    caption: Option<String>,
}

/// Guard and flip the loading flag, handing back the image to upload.
fn begin(state: &SharedState) -> Result<SelectedImage, DispatchError> {
    let mut session = state.lock();
    if session.is_loading {
        return Err(DispatchError::InFlight);
    }
    let image = session.image.clone().ok_or(DispatchError::NoImage)?;
    session.is_loading = true;
    Ok(image)
}

/// Reconcile the outcome into state. Clears the loading flag on every path;
/// this is the only guaranteed cleanup in the flow.
fn finish(
    state: &SharedState,
    result: Result<String, DispatchError>,
) -> Result<String, DispatchError> {
    let mut session = state.lock();
    session.is_loading = false;
    match result {
        Ok(caption) => {
            session.caption = caption.clone();
            Ok(caption)
        }
        Err(e) => Err(e),
    }
}

/// POST the image under the fixed `file` field and pull the caption out of
/// the JSON body. The HTTP status is not checked: any JSON object without a
/// usable caption degrades to the fallback string, while a non-JSON body or
/// transport failure is the error path.
async fn request_caption(
    client: &reqwest::Client,
    endpoint: &str,
    image: &SelectedImage,
) -> Result<String, DispatchError> {
    let part = multipart::Part::bytes(image.bytes.clone())
        .file_name(image.file_name.clone())
        .mime_str(&image.mime)?;
    let form = multipart::Form::new().part("file", part);

    let response = client.post(endpoint).multipart(form).send().await?;
    let body: CaptionResponse = response.json().await?;

    Ok(match body.caption {
        Some(caption) if !caption.is_empty() => caption,
        _ => FALLBACK_CAPTION.to_string(),
    })
}

/// Full dispatch round-trip against `endpoint`.
pub async fn dispatch(
    state: &SharedState,
    client: &reqwest::Client,
    endpoint: &str,
) -> Result<String, DispatchError> {
    let image = begin(state)?;
    let result = request_caption(client, endpoint, &image).await;
    finish(state, result)
}

#[tauri::command]
pub async fn generate_caption(
    app: AppHandle,
    state: tauri::State<'_, SharedState>,
    client: tauri::State<'_, reqwest::Client>,
) -> Result<String, String> {
    let image = begin(state.inner()).map_err(|e| e.to_string())?;
    crate::emit_state(&app, state.inner());

    log::info!(
        "dispatching caption request for {} ({} bytes)",
        image.file_name,
        image.bytes.len()
    );

    let result = request_caption(client.inner(), CAPTION_ENDPOINT, &image).await;
    let outcome = finish(state.inner(), result);
    crate::emit_state(&app, state.inner());

    match outcome {
        Ok(caption) => {
            log::info!("caption received ({} chars)", caption.chars().count());
            Ok(caption)
        }
        Err(e) => {
            log::error!("{}", e);
            Err(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ControllerState;
    use axum::{routing::post, Json, Router};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn staged_state() -> SharedState {
        Arc::new(Mutex::new(ControllerState {
            image: Some(SelectedImage {
                file_name: "photo.png".into(),
                mime: "image/png".into(),
                bytes: vec![0x89, b'P', b'N', b'G'],
            }),
            ..Default::default()
        }))
    }

    /// Spin up a throwaway caption service on an ephemeral port.
    async fn stub_service(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind stub service");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/generate-caption", addr)
    }

    #[tokio::test]
    async fn caption_from_successful_response() {
        let endpoint = stub_service(Router::new().route(
            "/generate-caption",
            post(|| async { Json(serde_json::json!({ "caption": "Hello" })) }),
        ))
        .await;

        let state = staged_state();
        let client = reqwest::Client::new();
        let caption = dispatch(&state, &client, &endpoint).await.unwrap();

        assert_eq!(caption, "Hello");
        let session = state.lock();
        assert_eq!(session.caption, "Hello");
        assert!(!session.is_loading);
    }

    #[tokio::test]
    async fn missing_caption_field_degrades_to_fallback() {
        let endpoint = stub_service(Router::new().route(
            "/generate-caption",
            post(|| async { Json(serde_json::json!({ "detail": "model unavailable" })) }),
        ))
        .await;

        let state = staged_state();
        let client = reqwest::Client::new();
        let caption = dispatch(&state, &client, &endpoint).await.unwrap();

        assert_eq!(caption, FALLBACK_CAPTION);
        assert_eq!(state.lock().caption, FALLBACK_CAPTION);
    }

    #[tokio::test]
    async fn empty_caption_degrades_to_fallback() {
        let endpoint = stub_service(Router::new().route(
            "/generate-caption",
            post(|| async { Json(serde_json::json!({ "caption": "" })) }),
        ))
        .await;

        let state = staged_state();
        let client = reqwest::Client::new();
        let caption = dispatch(&state, &client, &endpoint).await.unwrap();

        assert_eq!(caption, FALLBACK_CAPTION);
    }

    #[tokio::test]
    async fn transport_failure_clears_loading_and_keeps_caption() {
        // Bind then drop the listener so the port refuses connections.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/generate-caption", listener.local_addr().unwrap());
        drop(listener);

        let state = staged_state();
        state.lock().caption = "previous".into();
        let client = reqwest::Client::new();

        let err = dispatch(&state, &client, &endpoint).await.unwrap_err();
        assert!(matches!(err, DispatchError::Request(_)));

        let session = state.lock();
        assert!(!session.is_loading);
        assert_eq!(session.caption, "previous");
    }

    #[tokio::test]
    async fn non_json_body_is_an_error() {
        let endpoint = stub_service(Router::new().route(
            "/generate-caption",
            post(|| async { "plain text, not json" }),
        ))
        .await;

        let state = staged_state();
        let client = reqwest::Client::new();
        let err = dispatch(&state, &client, &endpoint).await.unwrap_err();

        assert!(matches!(err, DispatchError::Request(_)));
        assert!(!state.lock().is_loading);
    }

    #[tokio::test]
    async fn refuses_dispatch_without_image() {
        let state: SharedState = Arc::new(Mutex::new(ControllerState::default()));
        let client = reqwest::Client::new();
        let err = dispatch(&state, &client, "http://127.0.0.1:1/unused")
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoImage));
        assert!(!state.lock().is_loading);
    }

    #[tokio::test]
    async fn refuses_dispatch_while_in_flight() {
        let state = staged_state();
        state.lock().is_loading = true;
        let client = reqwest::Client::new();
        let err = dispatch(&state, &client, "http://127.0.0.1:1/unused")
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InFlight));
        // The guard must not clear a flag it does not own.
        assert!(state.lock().is_loading);
    }

    #[tokio::test]
    async fn uploads_bytes_under_the_file_field() {
        let endpoint = stub_service(Router::new().route(
            "/generate-caption",
            post(|body: axum::body::Bytes| async move {
                let raw = String::from_utf8_lossy(&body);
                let caption = if raw.contains("name=\"file\"") && raw.contains("filename=\"photo.png\"") {
                    "field ok"
                } else {
                    "field missing"
                };
                Json(serde_json::json!({ "caption": caption }))
            }),
        ))
        .await;

        let state = staged_state();
        let client = reqwest::Client::new();
        let caption = dispatch(&state, &client, &endpoint).await.unwrap();
        assert_eq!(caption, "field ok");
    }
}

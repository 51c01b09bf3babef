//! Session state for the upload-and-caption flow.
//!
//! One in-memory holder per app, managed by Tauri and shared with the
//! commands behind a mutex. Nothing here survives a restart.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

/// The image currently staged for captioning.
///
/// Bytes live in memory until replaced by the next intake; they are never
/// written to disk.
#[derive(Debug, Clone)]
pub struct SelectedImage {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct ControllerState {
    pub image: Option<SelectedImage>,
    /// Base64 data-URL of the selected image, rebuilt on every intake.
    pub preview: Option<String>,
    /// Caption text, or the fixed fallback string. Empty until a request
    /// succeeds; cleared whenever a new image is accepted.
    pub caption: String,
    pub is_loading: bool,
    pub copied: bool,
}

/// Shared handle to the single state holder. Locks are held only for short
/// scopes on the command paths, never across an await.
pub type SharedState = Arc<Mutex<ControllerState>>;

/// View of the state sent to the frontend. Image bytes stay Rust-side; the
/// page renders the preview data-URL instead.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub has_image: bool,
    pub file_name: Option<String>,
    pub preview: Option<String>,
    pub caption: String,
    pub is_loading: bool,
    pub copied: bool,
}

impl ControllerState {
    /// Whether the generate button should be live: an image is staged and no
    /// request is in flight.
    pub fn can_dispatch(&self) -> bool {
        self.image.is_some() && !self.is_loading
    }

    /// Whether there is caption text to copy.
    pub fn can_copy(&self) -> bool {
        !self.caption.is_empty()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            has_image: self.image.is_some(),
            file_name: self.image.as_ref().map(|i| i.file_name.clone()),
            preview: self.preview.clone(),
            caption: self.caption.clone(),
            is_loading: self.is_loading,
            copied: self.copied,
        }
    }
}

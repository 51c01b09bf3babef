//! File intake: click-to-browse and drag-and-drop.
//!
//! Both paths stage the file as the selected image, rebuild the preview
//! data-URL and clear any previous caption. Drops are content-sniffed and
//! non-images are silently ignored; the picker trusts its own filter and
//! does not re-validate.

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use rfd::FileDialog;
use tauri::AppHandle;

use crate::state::{SelectedImage, SharedState, StateSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Picker,
    Drop,
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Sniff the MIME type from the file's magic bytes. `image::guess_format`
/// only recognises image formats, so a `Some` here is always an `image/*`.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|f| f.to_mime_type())
}

/// Extension-based MIME fallback for picker files that fail sniffing.
fn mime_from_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(bytes))
}

/// Stage a file as the selected image.
///
/// Returns `Ok(false)` when a dropped file does not sniff as an image; the
/// drop is ignored and the state is left untouched. Picker files are always
/// accepted (the dialog filter already restricted the choice).
pub fn accept_file(state: &SharedState, path: &Path, source: Source) -> Result<bool, IntakeError> {
    let bytes = fs::read(path).map_err(|source| IntakeError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mime = match (source, sniff_mime(&bytes)) {
        (_, Some(mime)) => mime,
        (Source::Drop, None) => return Ok(false),
        (Source::Picker, None) => mime_from_extension(path),
    };

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    let preview = data_url(mime, &bytes);

    let mut session = state.lock();
    session.image = Some(SelectedImage {
        file_name,
        mime: mime.to_string(),
        bytes,
    });
    session.preview = Some(preview);
    session.caption.clear();
    Ok(true)
}

#[tauri::command]
pub async fn select_image(
    app: AppHandle,
    state: tauri::State<'_, SharedState>,
) -> Result<StateSnapshot, String> {
    let picked = FileDialog::new()
        .set_directory(".")
        .add_filter("Image files", &["jpg", "jpeg", "png", "gif", "webp", "bmp"])
        .pick_file();

    if let Some(path) = picked {
        accept_file(state.inner(), &path, Source::Picker).map_err(|e| e.to_string())?;
        log::info!("selected image: {}", path.display());
        crate::emit_state(&app, state.inner());
    }

    Ok(state.lock().snapshot())
}

//! Clipboard writer with the transient "copied" confirmation.

use std::time::Duration;

use tauri::AppHandle;
use tauri_plugin_clipboard_manager::ClipboardExt;

use crate::state::SharedState;

/// How long the copied confirmation stays up before resetting.
pub const COPIED_RESET: Duration = Duration::from_millis(2000);

/// Seam over the OS clipboard so the copy flow can be exercised in tests.
pub trait ClipboardSink {
    fn write_text(&self, text: &str) -> anyhow::Result<()>;
}

struct AppClipboard<'a>(&'a AppHandle);

impl ClipboardSink for AppClipboard<'_> {
    fn write_text(&self, text: &str) -> anyhow::Result<()> {
        self.0
            .clipboard()
            .write_text(text.to_string())
            .map_err(|e| anyhow::anyhow!("clipboard write failed: {e}"))
    }
}

/// Write the current caption verbatim and raise the copied flag.
///
/// Returns the copied text, or `None` when there is no caption to copy.
pub fn write_caption<S: ClipboardSink>(
    state: &SharedState,
    sink: &S,
) -> anyhow::Result<Option<String>> {
    let text = {
        let session = state.lock();
        if !session.can_copy() {
            return Ok(None);
        }
        session.caption.clone()
    };

    sink.write_text(&text)?;
    state.lock().copied = true;
    Ok(Some(text))
}

/// Lower the copied flag after `hold`. Every copy spawns its own reset; rapid
/// repeats overlap, and the flag settles to false once the last one fires.
pub async fn clear_copied_after(state: SharedState, hold: Duration) {
    tokio::time::sleep(hold).await;
    state.lock().copied = false;
}

#[tauri::command]
pub async fn copy_caption(
    app: AppHandle,
    state: tauri::State<'_, SharedState>,
) -> Result<bool, String> {
    let written = write_caption(state.inner(), &AppClipboard(&app)).map_err(|e| {
        log::error!("{}", e);
        e.to_string()
    })?;

    let Some(text) = written else {
        return Ok(false);
    };
    log::info!("caption copied to clipboard ({} chars)", text.chars().count());
    crate::emit_state(&app, state.inner());

    let shared = state.inner().clone();
    tokio::spawn(async move {
        clear_copied_after(shared.clone(), COPIED_RESET).await;
        crate::emit_state(&app, &shared);
    });

    Ok(true)
}

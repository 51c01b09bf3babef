mod clipboard;
mod dispatcher;
mod intake;
mod state;

use tauri::{AppHandle, Emitter, Manager};

use state::{SharedState, StateSnapshot};

/// Push the current snapshot to the page. The view is stateless and simply
/// re-renders whatever arrives here.
pub(crate) fn emit_state(app: &AppHandle, state: &SharedState) {
    let snapshot = state.lock().snapshot();
    if let Err(e) = app.emit("state_changed", snapshot) {
        log::error!("emit error: {}", e);
    }
}

#[tauri::command]
async fn get_state(state: tauri::State<'_, SharedState>) -> Result<StateSnapshot, String> {
    Ok(state.lock().snapshot())
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(
            tauri_plugin_log::Builder::default()
                .level(log::LevelFilter::Info)
                .build(),
        )
        .plugin(tauri_plugin_clipboard_manager::init())
        .manage(SharedState::default())
        .manage(reqwest::Client::new())
        .on_window_event(|window, event| {
            if let tauri::WindowEvent::DragDrop(tauri::DragDropEvent::Drop { paths, .. }) = event {
                let Some(path) = paths.first() else { return };
                let app = window.app_handle();
                let state = app.state::<SharedState>();
                match intake::accept_file(state.inner(), path, intake::Source::Drop) {
                    Ok(true) => {
                        log::info!("accepted dropped image: {}", path.display());
                        emit_state(app, state.inner());
                    }
                    Ok(false) => {
                        log::debug!("ignored non-image drop: {}", path.display());
                    }
                    Err(e) => {
                        log::error!("{}", e);
                        if let Err(e) = app.emit("error", e.to_string()) {
                            log::error!("emit error: {}", e);
                        }
                    }
                }
            }
        })
        .invoke_handler(tauri::generate_handler![
            get_state,
            intake::select_image,
            dispatcher::generate_caption,
            clipboard::copy_caption
        ])
        .run(tauri::generate_context!())
        .expect("error while running Tauri application");
}

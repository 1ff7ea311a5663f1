use tauri::State;

use crate::capture::SpotlightPoint;
use crate::overlay::SelectionPayload;
use crate::AppState;

/// Run one full trigger cycle. Both webview-originated gestures and the
/// global listener end up here, so duplicate events collapse on the
/// pipeline's single-flight flag.
#[tauri::command]
pub async fn trigger_selection(
    state: State<'_, AppState>,
    origin: Option<SpotlightPoint>,
) -> Result<(), String> {
    state.pipeline.trigger(origin).await.map_err(|e| e.to_string())
}

/// Capture-and-match without showing the popup; `None` when nothing was
/// selected or no rule matched.
#[tauri::command]
pub async fn process_selection(
    state: State<'_, AppState>,
) -> Result<Option<SelectionPayload>, String> {
    state
        .pipeline
        .process_selection()
        .await
        .map_err(|e| e.to_string())
}

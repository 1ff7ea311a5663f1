use tauri::State;

use crate::AppState;

#[tauri::command]
pub async fn overlay_select(state: State<'_, AppState>, index: usize) -> Result<(), String> {
    state.overlay.select(index).await;
    Ok(())
}

#[tauri::command]
pub async fn overlay_digit(state: State<'_, AppState>, digit: u8) -> Result<(), String> {
    state.overlay.digit(digit).await;
    Ok(())
}

#[tauri::command]
pub async fn overlay_move(state: State<'_, AppState>, delta: i64) -> Result<(), String> {
    state.overlay.move_selection(delta).await;
    Ok(())
}

#[tauri::command]
pub async fn overlay_activate(state: State<'_, AppState>) -> Result<(), String> {
    state.overlay.activate().await;
    Ok(())
}

#[tauri::command]
pub async fn overlay_copy(state: State<'_, AppState>) -> Result<(), String> {
    state.overlay.copy_result().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn overlay_dismiss(state: State<'_, AppState>) -> Result<(), String> {
    state.overlay.dismiss().await;
    Ok(())
}

use tauri::State;

use crate::AppState;

use super::types::Rule;

#[tauri::command]
pub async fn get_actions_list(state: State<'_, AppState>) -> Result<Vec<Rule>, String> {
    Ok(state.rules.rules())
}

#[tauri::command]
pub async fn save_actions(state: State<'_, AppState>, actions: String) -> Result<(), String> {
    state.rules.save_raw(&actions).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn reload_actions(state: State<'_, AppState>) -> Result<(), String> {
    state.rules.force_reload();
    Ok(())
}

#[tauri::command]
pub async fn import_actions(state: State<'_, AppState>, path: String) -> Result<String, String> {
    let count = state.rules.import(&path).map_err(|e| e.to_string())?;
    Ok(format!("Imported {count} rules."))
}

/// Draft a rule from a natural-language description. The caller reviews and
/// saves it explicitly; nothing is persisted here.
#[tauri::command]
pub async fn ai_generate_rule(
    state: State<'_, AppState>,
    description: String,
) -> Result<Rule, String> {
    state
        .ai
        .generate_rule(&description)
        .await
        .map_err(|e| e.to_string())
}

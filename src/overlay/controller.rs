use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Serialize;
use tauri::{AppHandle, Emitter};
use tokio::sync::Mutex;

use crate::capture::CaptureContext;
use crate::dispatch::{ActionResult, DispatchOutcome, Dispatcher};
use crate::rules::Rule;
use crate::window::{WindowCoordinator, POPUP_LABEL};

use super::session::{OverlayState, PendingDispatch, Session};

pub const SELECTION_EVENT: &str = "trigger-selection";
pub const STATE_EVENT: &str = "overlay-state";
pub const COPIED_EVENT: &str = "overlay-copied";

/// Keep the "copied" acknowledgement on screen briefly before closing.
const COPY_ACK_MS: u64 = 300;

/// Payload published to the popup when a capture produced candidates.
/// Re-delivery just restarts the session, so the receiver is idempotent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionPayload {
    pub actions: Vec<Rule>,
    pub captured_text: String,
    pub ai_result: Option<ActionResult>,
}

/// Drives the overlay session: applies state-machine transitions, publishes
/// snapshots to the popup window, and owns the dispatch lifecycle including
/// stale-result rejection.
#[derive(Clone)]
pub struct OverlayController {
    app: AppHandle,
    state: Arc<Mutex<OverlayState>>,
    dispatcher: Arc<Dispatcher>,
    coordinator: WindowCoordinator,
}

impl OverlayController {
    pub fn new(app: AppHandle, dispatcher: Arc<Dispatcher>, coordinator: WindowCoordinator) -> Self {
        Self {
            app,
            state: Arc::new(Mutex::new(OverlayState::new())),
            dispatcher,
            coordinator,
        }
    }

    /// A fresh capture arrived: discard whatever session is in flight and
    /// restart at the candidate strip.
    pub async fn begin_session(&self, context: CaptureContext, candidates: Vec<Rule>) {
        let (session, restarted) = {
            let mut state = self.state.lock().await;
            state.begin(context, candidates)
        };

        if restarted {
            // Back to the compact footprint before any content-driven resize.
            if let Err(err) = self.coordinator.reset_popup() {
                warn!("failed to reset popup size: {err:#}");
            }
        }

        let payload = SelectionPayload {
            actions: session.candidates.clone(),
            captured_text: session.context.text.clone(),
            ai_result: None,
        };
        self.emit(SELECTION_EVENT, &payload);
        self.emit_state(&session);
    }

    pub async fn select(&self, index: usize) {
        let pending = self.state.lock().await.select(index);
        self.after_selection(pending).await;
    }

    pub async fn digit(&self, digit: u8) {
        let pending = self.state.lock().await.digit(digit);
        self.after_selection(pending).await;
    }

    /// Enter key: dispatch the candidate under the keyboard index.
    pub async fn activate(&self) {
        let pending = self.state.lock().await.activate_current();
        self.after_selection(pending).await;
    }

    pub async fn move_selection(&self, delta: i64) {
        let snapshot = {
            let mut state = self.state.lock().await;
            if state.move_selection(delta) {
                state.snapshot()
            } else {
                None
            }
        };
        if let Some(session) = snapshot {
            self.emit_state(&session);
        }
    }

    /// Copy the shown result to the clipboard, acknowledge, then close.
    pub async fn copy_result(&self) -> Result<()> {
        let (text, generation) = {
            let state = self.state.lock().await;
            match (state.result_text(), state.current_generation()) {
                (Some(text), Some(generation)) => (text, generation),
                _ => return Ok(()),
            }
        };

        arboard::Clipboard::new()
            .and_then(|mut clipboard| clipboard.set_text(text))
            .context("failed to write clipboard")?;

        self.emit(COPIED_EVENT, &());

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(COPY_ACK_MS)).await;
            let still_current = {
                let state = this.state.lock().await;
                state.current_generation() == Some(generation)
            };
            if still_current {
                this.dismiss().await;
            }
        });

        Ok(())
    }

    /// Escape key, window blur, or close after copy.
    pub async fn dismiss(&self) {
        let snapshot = {
            let mut state = self.state.lock().await;
            if state.dismiss() {
                state.snapshot()
            } else {
                None
            }
        };

        let Some(session) = snapshot else { return };
        self.emit_state(&session);
        if let Err(err) = self.coordinator.set_visible(POPUP_LABEL, false) {
            warn!("failed to hide popup: {err:#}");
        }
    }

    async fn after_selection(&self, pending: Option<PendingDispatch>) {
        let Some(pending) = pending else { return };

        if let Some(session) = self.state.lock().await.snapshot() {
            self.emit_state(&session);
        }

        let this = self.clone();
        tokio::spawn(async move {
            this.run_dispatch(pending).await;
        });
    }

    async fn run_dispatch(&self, pending: PendingDispatch) {
        let generation = pending.generation;
        let outcome = self.dispatcher.dispatch(&pending.rule, &pending.text).await;

        match outcome {
            Ok(DispatchOutcome::Display(result)) => {
                let snapshot = {
                    let mut state = self.state.lock().await;
                    if state.apply_result(generation, result.clone()) {
                        state.snapshot()
                    } else {
                        None
                    }
                };

                match snapshot {
                    Some(session) => {
                        self.emit_state(&session);
                        if let Err(err) = self.coordinator.size_popup_for_result(&result.text) {
                            warn!("failed to resize popup for result: {err:#}");
                        }
                    }
                    None => debug!(
                        "dropping stale dispatch result for generation {generation}"
                    ),
                }
            }
            Ok(DispatchOutcome::CloseOverlay) => {
                let closed = self.state.lock().await.close_if_current(generation);
                if closed {
                    self.dismiss_window_only().await;
                } else {
                    debug!("dropping stale close for generation {generation}");
                }
            }
            Err(err) => {
                // Non-script failures return to the strip so the user can
                // retry; the error itself only reaches the log.
                warn!(
                    "{} action '{}' failed: {err:#}",
                    pending.rule.action.kind_name(),
                    pending.rule.meta.name
                );
                let snapshot = {
                    let mut state = self.state.lock().await;
                    if state.fail_executing(generation) {
                        state.snapshot()
                    } else {
                        None
                    }
                };
                if let Some(session) = snapshot {
                    self.emit_state(&session);
                }
            }
        }
    }

    async fn dismiss_window_only(&self) {
        if let Some(session) = self.state.lock().await.snapshot() {
            self.emit_state(&session);
        }
        if let Err(err) = self.coordinator.set_visible(POPUP_LABEL, false) {
            warn!("failed to hide popup: {err:#}");
        }
    }

    fn emit_state(&self, session: &Session) {
        self.emit(STATE_EVENT, session);
    }

    fn emit<P: Serialize + Clone>(&self, event: &str, payload: &P) {
        if let Err(err) = self.app.emit_to(POPUP_LABEL, event, payload.clone()) {
            warn!("failed to emit {event}: {err}");
        }
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::capture::{CaptureSource, SpotlightPoint};
use crate::overlay::{OverlayController, SelectionPayload};
use crate::rules::{matcher, RuleStore};
use crate::settings::SettingsStore;
use crate::window::{WindowCoordinator, POPUP_LABEL};

/// At-most-one pipeline execution; concurrent attempts are dropped, not
/// queued. The guard releases the flag on every exit path, including panics
/// and early returns.
pub struct SingleFlight {
    busy: Arc<AtomicBool>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self {
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn try_acquire(&self) -> Option<FlightGuard> {
        if self.busy.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(FlightGuard {
                busy: self.busy.clone(),
            })
        }
    }
}

impl Clone for SingleFlight {
    fn clone(&self) -> Self {
        Self {
            busy: self.busy.clone(),
        }
    }
}

pub struct FlightGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Owns the trigger lifecycle: capture the selection, match it against the
/// latest rule snapshot, and hand the result to the overlay. Every trigger
/// adapter (global listener, frontend command) funnels into `trigger`.
#[derive(Clone)]
pub struct PipelineController {
    flight: SingleFlight,
    rules: Arc<RuleStore>,
    settings: Arc<SettingsStore>,
    capture: Arc<CaptureSource>,
    overlay: OverlayController,
    coordinator: WindowCoordinator,
}

impl PipelineController {
    pub fn new(
        rules: Arc<RuleStore>,
        settings: Arc<SettingsStore>,
        capture: Arc<CaptureSource>,
        overlay: OverlayController,
        coordinator: WindowCoordinator,
    ) -> Self {
        Self {
            flight: SingleFlight::new(),
            rules,
            settings,
            capture,
            overlay,
            coordinator,
        }
    }

    /// Fire-and-forget entry point usable from any thread (the rdev listener
    /// runs outside the async runtime).
    pub fn request_trigger(&self, origin: Option<SpotlightPoint>) {
        let this = self.clone();
        tauri::async_runtime::spawn(async move {
            if let Err(err) = this.trigger(origin).await {
                warn!("trigger cycle failed: {err:#}");
            }
        });
    }

    /// One full pipeline cycle. A call arriving while another is in flight is
    /// a no-op.
    pub async fn trigger(&self, origin: Option<SpotlightPoint>) -> Result<()> {
        let Some(_guard) = self.flight.try_acquire() else {
            debug!("trigger dropped: pipeline busy");
            return Ok(());
        };

        let Some(context) = self.capture_selection(origin).await? else {
            debug!("no selection captured, aborting trigger cycle");
            return Ok(());
        };

        let candidates = self.matched_candidates(&context);
        if candidates.is_empty() {
            debug!("no matching rules for selection from {}", context.app_id);
            return Ok(());
        }

        info!(
            "{} candidate actions for {} chars captured from {}",
            candidates.len(),
            context.text.chars().count(),
            context.app_id
        );

        if let Some(origin) = context.origin {
            if let Err(err) = self.coordinator.position_popup(origin) {
                warn!("failed to position popup: {err:#}");
            }
        }

        self.coordinator.set_visible(POPUP_LABEL, true)?;
        self.overlay.begin_session(context, candidates).await;
        Ok(())
    }

    /// Capture-and-match without any overlay side effects, for the
    /// `process_selection` command. Shares the single-flight flag so it can't
    /// race a hotkey trigger over the clipboard.
    pub async fn process_selection(&self) -> Result<Option<SelectionPayload>> {
        let Some(_guard) = self.flight.try_acquire() else {
            debug!("process_selection dropped: pipeline busy");
            return Ok(None);
        };

        let Some(context) = self.capture_selection(None).await? else {
            return Ok(None);
        };

        let candidates = self.matched_candidates(&context);
        if candidates.is_empty() {
            return Ok(None);
        }

        Ok(Some(SelectionPayload {
            actions: candidates,
            captured_text: context.text,
            ai_result: None,
        }))
    }

    async fn capture_selection(
        &self,
        origin: Option<SpotlightPoint>,
    ) -> Result<Option<crate::capture::CaptureContext>> {
        let capture = self.capture.clone();
        tokio::task::spawn_blocking(move || capture.capture(origin))
            .await
            .context("capture task panicked")
    }

    fn matched_candidates(&self, context: &crate::capture::CaptureContext) -> Vec<crate::rules::Rule> {
        // Always match against the latest snapshot; the store re-reads the
        // file when it changed.
        let snapshot = self.rules.snapshot();
        let mut candidates = matcher::match_rules(context, &snapshot);

        if self.settings.is_blacklisted(&context.app_id) {
            let before = candidates.len();
            candidates.retain(|rule| !rule.action.is_ai());
            if candidates.len() != before {
                debug!(
                    "{} is blacklisted, dropped {} AI actions",
                    context.app_id,
                    before - candidates.len()
                );
            }
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_first_is_held() {
        let flight = SingleFlight::new();
        let guard = flight.try_acquire().expect("first acquire");
        assert!(flight.try_acquire().is_none());
        drop(guard);
        assert!(flight.try_acquire().is_some());
    }

    #[test]
    fn guard_releases_on_early_return_paths() {
        let flight = SingleFlight::new();

        fn short_circuit(flight: &SingleFlight) -> Option<()> {
            let _guard = flight.try_acquire()?;
            // Simulated early return mid-cycle (e.g. capture failure).
            let capture_result: Option<()> = None;
            capture_result?;
            Some(())
        }

        assert!(short_circuit(&flight).is_none());
        assert!(flight.try_acquire().is_some());
    }

    #[test]
    fn guard_releases_when_the_holder_panics() {
        let flight = SingleFlight::new();
        let clone = flight.clone();

        let result = std::panic::catch_unwind(move || {
            let _guard = clone.try_acquire().expect("acquire");
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(flight.try_acquire().is_some());
    }

    #[tokio::test]
    async fn concurrent_attempts_yield_exactly_one_winner() {
        let flight = Arc::new(SingleFlight::new());
        let winners = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::new();
        let hold = Arc::new(tokio::sync::Barrier::new(9));
        for _ in 0..8 {
            let flight = flight.clone();
            let winners = winners.clone();
            let hold = hold.clone();
            handles.push(tokio::spawn(async move {
                let guard = flight.try_acquire();
                let won = guard.is_some();
                if won {
                    assert!(
                        !winners.swap(true, Ordering::SeqCst),
                        "two tasks acquired the flight at once"
                    );
                }
                // Keep winners holding their guard until everyone attempted.
                hold.wait().await;
                won
            }));
        }
        hold.wait().await;

        let mut won_count = 0;
        for handle in handles {
            if handle.await.expect("task join") {
                won_count += 1;
            }
        }
        assert_eq!(won_count, 1);
    }
}

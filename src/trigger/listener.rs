use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info};
use rdev::{listen, Button, Event, EventType, Key};

use crate::capture::SpotlightPoint;
use crate::overlay::OverlayController;
use crate::pipeline::PipelineController;
use crate::settings::SettingsStore;

/// Mouse-up after a drag longer than this counts as a text selection.
const SELECTION_DRAG_MIN_PX: f64 = 40.0;
/// Moving this far away from a fresh selection fires the select-move gesture.
const SELECT_MOVE_MIN_PX: f64 = 30.0;
/// How long a selection stays armed for the select-move gesture.
const SELECT_MOVE_WINDOW: Duration = Duration::from_secs(2);

struct ListenerState {
    mouse_pos: (f64, f64),
    drag_start: Option<(f64, f64)>,
    selection_end: Option<(f64, f64, Instant)>,
    last_trigger_press: Instant,
    trigger_press_count: u32,
}

/// Global hotkey/gesture listener. It owns no pipeline logic: every detected
/// gesture funnels into `PipelineController::request_trigger`, so duplicate
/// or overlapping events collapse on the controller's single-flight flag.
pub struct TriggerListener {
    settings: Arc<SettingsStore>,
    pipeline: PipelineController,
    overlay: OverlayController,
}

impl TriggerListener {
    pub fn new(
        settings: Arc<SettingsStore>,
        pipeline: PipelineController,
        overlay: OverlayController,
    ) -> Self {
        Self {
            settings,
            pipeline,
            overlay,
        }
    }

    /// Spawns the OS-level listener thread; `rdev::listen` blocks forever.
    pub fn start(self) {
        thread::spawn(move || {
            info!("global trigger listener started");

            let mut state = ListenerState {
                mouse_pos: (0.0, 0.0),
                drag_start: None,
                selection_end: None,
                last_trigger_press: Instant::now(),
                trigger_press_count: 0,
            };

            let listener = self;
            let callback = move |event: Event| listener.handle(&mut state, event);

            if let Err(err) = listen(callback) {
                error!("global listener failed: {err:?}");
            }
        });
    }

    fn handle(&self, state: &mut ListenerState, event: Event) {
        match event.event_type {
            EventType::MouseMove { x, y } => {
                state.mouse_pos = (x, y);
                self.check_select_move(state, x, y);
            }
            EventType::ButtonPress(Button::Left) => {
                state.drag_start = Some(state.mouse_pos);
                state.selection_end = None;
            }
            EventType::ButtonRelease(Button::Left) => {
                let pos = state.mouse_pos;
                if let Some(start) = state.drag_start.take() {
                    if distance(start, pos) > SELECTION_DRAG_MIN_PX {
                        debug!("selection drag detected, arming select-move window");
                        state.selection_end = Some((pos.0, pos.1, Instant::now()));
                    }
                }
            }
            EventType::KeyPress(key) => self.handle_key(state, key),
            _ => {}
        }
    }

    fn check_select_move(&self, state: &mut ListenerState, x: f64, y: f64) {
        let Some((sx, sy, armed_at)) = state.selection_end else {
            return;
        };

        if armed_at.elapsed() >= SELECT_MOVE_WINDOW {
            state.selection_end = None;
            return;
        }

        if self.settings.hotkey().trigger_type != "select_move" {
            return;
        }

        if distance((sx, sy), (x, y)) > SELECT_MOVE_MIN_PX {
            state.selection_end = None;
            debug!("select-move gesture at ({x:.0}, {y:.0})");
            self.pipeline
                .request_trigger(Some(SpotlightPoint { x, y }));
        }
    }

    fn handle_key(&self, state: &mut ListenerState, key: Key) {
        if key == Key::Escape {
            let overlay = self.overlay.clone();
            tauri::async_runtime::spawn(async move {
                overlay.dismiss().await;
            });
            return;
        }

        let hotkey = self.settings.hotkey();
        let is_trigger_key = matches!(
            (key, hotkey.trigger_key.as_str()),
            (Key::ControlLeft | Key::ControlRight, "Ctrl")
                | (Key::ShiftLeft | Key::ShiftRight, "Shift")
                | (Key::Alt | Key::AltGr, "Alt")
        );
        if !is_trigger_key {
            return;
        }

        match hotkey.trigger_type.as_str() {
            "single_press" => {
                let pos = state.mouse_pos;
                self.pipeline
                    .request_trigger(Some(SpotlightPoint { x: pos.0, y: pos.1 }));
            }
            "double_press" => {
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_trigger_press);
                if elapsed < Duration::from_millis(hotkey.trigger_interval) {
                    state.trigger_press_count += 1;
                } else {
                    state.trigger_press_count = 1;
                }
                state.last_trigger_press = now;

                if state.trigger_press_count == 2 {
                    state.trigger_press_count = 0;
                    let pos = state.mouse_pos;
                    debug!("double {:?} detected", key);
                    self.pipeline
                        .request_trigger(Some(SpotlightPoint { x: pos.0, y: pos.1 }));
                }
            }
            _ => {}
        }
    }
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(distance((0.0, 0.0), (3.0, 4.0)), 5.0);
    }
}

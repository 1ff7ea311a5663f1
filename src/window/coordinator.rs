use anyhow::{anyhow, Result};
use log::debug;
use tauri::{AppHandle, Manager, WebviewWindow};

use crate::capture::SpotlightPoint;

pub const MAIN_LABEL: &str = "main";
pub const POPUP_LABEL: &str = "popup";

/// Popup width never changes; only height and anchor position do.
pub const POPUP_WIDTH: f64 = 420.0;
/// Compact footprint for the horizontal action strip.
pub const STRIP_HEIGHT: f64 = 64.0;

// Height estimation for result text.
const WRAP_CHARS: usize = 52;
const LINE_HEIGHT: f64 = 20.0;
const CONTENT_PADDING: f64 = 32.0;
const ACTION_BAR_HEIGHT: f64 = 44.0;
const MIN_RESULT_HEIGHT: f64 = 120.0;
const MAX_DISPLAY_FRACTION: f64 = 0.8;

const SCREEN_MARGIN: i32 = 10;
const CURSOR_OFFSET: i32 = 20;

/// Estimate the popup height needed for a result text: wrap each line at the
/// fixed character width, multiply by the line height, add padding for the
/// content area and action bar, then clamp between the minimum footprint and
/// 80% of the display height.
pub fn estimate_result_height(text: &str, display_height: f64) -> f64 {
    let lines: usize = text
        .lines()
        .map(|line| {
            let chars = line.chars().count();
            chars.div_ceil(WRAP_CHARS).max(1)
        })
        .sum();

    let raw = lines as f64 * LINE_HEIGHT + CONTENT_PADDING + ACTION_BAR_HEIGHT;
    let cap = (display_height * MAX_DISPLAY_FRACTION).max(MIN_RESULT_HEIGHT);
    raw.clamp(MIN_RESULT_HEIGHT, cap)
}

/// Owns popup geometry: anchor positioning near the trigger point,
/// content-driven height, show/hide.
#[derive(Clone)]
pub struct WindowCoordinator {
    app: AppHandle,
}

impl WindowCoordinator {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }

    fn window(&self, label: &str) -> Result<WebviewWindow> {
        self.app
            .get_webview_window(label)
            .ok_or_else(|| anyhow!("no window with label {label}"))
    }

    pub fn set_visible(&self, label: &str, visible: bool) -> Result<()> {
        let window = self.window(label)?;
        if visible {
            window.show()?;
            window.set_focus()?;
        } else {
            window.hide()?;
        }
        Ok(())
    }

    /// Anchor the popup near the trigger point: below-right of the cursor,
    /// flipped above when the bottom edge would overflow, always kept inside
    /// the monitor that contains the point.
    pub fn position_popup(&self, point: SpotlightPoint) -> Result<()> {
        let window = self.window(POPUP_LABEL)?;

        let size = window.outer_size()?;
        let window_width = size.width as i32;
        let window_height = size.height as i32;

        let cursor_x = point.x as i32;
        let cursor_y = point.y as i32;

        let monitors = window.available_monitors()?;
        let target = monitors
            .iter()
            .find(|monitor| {
                let pos = monitor.position();
                let size = monitor.size();
                cursor_x >= pos.x
                    && cursor_x < pos.x + size.width as i32
                    && cursor_y >= pos.y
                    && cursor_y < pos.y + size.height as i32
            })
            .or_else(|| monitors.first())
            .ok_or_else(|| anyhow!("no available monitors"))?;

        let monitor_pos = target.position();
        let monitor_size = target.size();
        let monitor_right = monitor_pos.x + monitor_size.width as i32;
        let monitor_bottom = monitor_pos.y + monitor_size.height as i32;

        let mut popup_x = cursor_x + CURSOR_OFFSET;
        let mut popup_y = cursor_y + CURSOR_OFFSET;

        if popup_x + window_width > monitor_right {
            popup_x = monitor_right - window_width - SCREEN_MARGIN;
        }

        if popup_y + window_height > monitor_bottom {
            // Flip above the cursor; bottom of the monitor as a last resort.
            popup_y = cursor_y - window_height - SCREEN_MARGIN;
            if popup_y < monitor_pos.y + SCREEN_MARGIN {
                popup_y = monitor_bottom - window_height - SCREEN_MARGIN;
            }
        }

        popup_x = popup_x.max(monitor_pos.x + SCREEN_MARGIN);
        popup_y = popup_y.max(monitor_pos.y + SCREEN_MARGIN);

        window.set_position(tauri::Position::Physical(tauri::PhysicalPosition {
            x: popup_x,
            y: popup_y,
        }))?;
        Ok(())
    }

    /// Resize a window, then shift it up if the new size pushed its bottom
    /// edge off the monitor.
    pub fn adjust_size(&self, label: &str, width: f64, height: f64) -> Result<()> {
        let window = self.window(label)?;

        window.set_size(tauri::Size::Logical(tauri::LogicalSize { width, height }))?;

        let monitor = window
            .current_monitor()?
            .ok_or_else(|| anyhow!("no current monitor"))?;
        let monitor_pos = monitor.position();
        let monitor_bottom = monitor_pos.y + monitor.size().height as i32;

        let window_pos = window.outer_position()?;
        let window_size = window.outer_size()?;
        let window_bottom = window_pos.y + window_size.height as i32;

        if window_bottom > monitor_bottom - SCREEN_MARGIN {
            let overflow = window_bottom - (monitor_bottom - SCREEN_MARGIN);
            let safe_y = (window_pos.y - overflow).max(monitor_pos.y + SCREEN_MARGIN);

            window.set_position(tauri::Position::Physical(tauri::PhysicalPosition {
                x: window_pos.x,
                y: safe_y,
            }))?;
            debug!("shifted {label} up to y={safe_y} after resize overflow");
        }

        Ok(())
    }

    /// Back to the compact action-strip footprint.
    pub fn reset_popup(&self) -> Result<()> {
        self.adjust_size(POPUP_LABEL, POPUP_WIDTH, STRIP_HEIGHT)
    }

    /// Grow the popup for a result text, bounded by the current monitor.
    pub fn size_popup_for_result(&self, text: &str) -> Result<()> {
        let window = self.window(POPUP_LABEL)?;
        let display_height = window
            .current_monitor()?
            .map(|monitor| monitor.size().height as f64)
            .unwrap_or(1080.0);

        let height = estimate_result_height(text, display_height);
        self.adjust_size(POPUP_LABEL, POPUP_WIDTH, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_character_result_gets_the_minimum_footprint() {
        assert_eq!(estimate_result_height("a", 1000.0), MIN_RESULT_HEIGHT);
    }

    #[test]
    fn long_result_clamps_to_eighty_percent_of_display() {
        let text = "x".repeat(3000);
        assert_eq!(estimate_result_height(&text, 1000.0), 800.0);
    }

    #[test]
    fn empty_result_still_has_the_minimum_footprint() {
        assert_eq!(estimate_result_height("", 1000.0), MIN_RESULT_HEIGHT);
    }

    #[test]
    fn height_grows_with_wrapped_lines_between_the_clamps() {
        // 4 lines of 52 chars each: 4 * 20 + 32 + 44 = 156.
        let text = "y".repeat(WRAP_CHARS * 4);
        assert_eq!(estimate_result_height(&text, 1000.0), 156.0);
    }

    #[test]
    fn multiline_text_counts_each_line_separately() {
        // Three short lines wrap to one row each: 3 * 20 + 76 = 136.
        assert_eq!(estimate_result_height("a\nb\nc", 1000.0), 136.0);
    }

    #[test]
    fn tiny_display_never_inverts_the_clamp() {
        let text = "z".repeat(500);
        // 0.8 * 100 < minimum footprint; the cap must win without panicking.
        assert_eq!(estimate_result_height(&text, 100.0), MIN_RESULT_HEIGHT);
    }
}

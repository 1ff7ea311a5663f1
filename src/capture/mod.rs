use std::{thread, time::Duration};

use arboard::Clipboard;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Screen coordinate of the gesture that fired a trigger. The wire format
/// accepts both the `[x, y]` tuple and the `{x, y}` object encoding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "SpotlightPointRepr")]
pub struct SpotlightPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SpotlightPointRepr {
    Tuple(f64, f64),
    Fields { x: f64, y: f64 },
}

impl From<SpotlightPointRepr> for SpotlightPoint {
    fn from(repr: SpotlightPointRepr) -> Self {
        match repr {
            SpotlightPointRepr::Tuple(x, y) => Self { x, y },
            SpotlightPointRepr::Fields { x, y } => Self { x, y },
        }
    }
}

/// One trigger's worth of captured state. Produced once per trigger and
/// consumed exactly once by the matcher.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureContext {
    pub text: String,
    pub app_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<SpotlightPoint>,
}

// The clipboard needs a moment to settle after the synthesized copy chord.
const COPY_SETTLE_MS: u64 = 300;

/// Grabs the active selection by synthesizing the platform copy chord and
/// reading the clipboard back. Blocking; run on a blocking thread.
pub struct CaptureSource;

impl CaptureSource {
    pub fn new() -> Self {
        CaptureSource
    }

    /// Returns `None` when there is no selection or the clipboard cannot be
    /// read; the trigger cycle aborts silently in that case.
    pub fn capture(&self, origin: Option<SpotlightPoint>) -> Option<CaptureContext> {
        let app_id = self.frontmost_app_id();
        let text = self.copy_selection()?;
        if text.trim().is_empty() {
            debug!("capture produced only whitespace, dropping");
            return None;
        }

        Some(CaptureContext {
            text,
            app_id,
            origin,
        })
    }

    fn copy_selection(&self) -> Option<String> {
        let mut enigo = match Enigo::new(&Settings::default()) {
            Ok(enigo) => enigo,
            Err(err) => {
                warn!("failed to initialize input synthesis: {err}");
                return None;
            }
        };

        #[cfg(target_os = "macos")]
        {
            let _ = enigo.key(Key::Meta, Direction::Press);
            let _ = enigo.key(Key::Unicode('c'), Direction::Click);
            let _ = enigo.key(Key::Meta, Direction::Release);
        }

        #[cfg(not(target_os = "macos"))]
        {
            let _ = enigo.key(Key::Control, Direction::Press);
            let _ = enigo.key(Key::Unicode('c'), Direction::Click);
            thread::sleep(Duration::from_millis(50));
            let _ = enigo.key(Key::Control, Direction::Release);
        }

        thread::sleep(Duration::from_millis(COPY_SETTLE_MS));

        match Clipboard::new() {
            Ok(mut clipboard) => match clipboard.get_text() {
                Ok(text) => Some(text),
                Err(err) => {
                    debug!("clipboard read failed: {err}");
                    None
                }
            },
            Err(err) => {
                warn!("clipboard unavailable: {err}");
                None
            }
        }
    }

    /// Identity of the frontmost application, used for rule scoping.
    pub fn frontmost_app_id(&self) -> String {
        #[cfg(target_os = "windows")]
        {
            use std::ffi::OsString;
            use std::os::windows::ffi::OsStringExt;
            use winapi::um::handleapi::CloseHandle;
            use winapi::um::processthreadsapi::OpenProcess;
            use winapi::um::psapi::GetModuleBaseNameW;
            use winapi::um::winuser::{GetForegroundWindow, GetWindowThreadProcessId};

            unsafe {
                let hwnd = GetForegroundWindow();
                if hwnd.is_null() {
                    return String::from("unknown");
                }

                let mut process_id: u32 = 0;
                GetWindowThreadProcessId(hwnd, &mut process_id);

                // PROCESS_QUERY_INFORMATION | PROCESS_VM_READ
                let handle = OpenProcess(0x0410, 0, process_id);
                if handle.is_null() {
                    return String::from("unknown");
                }

                let mut buffer: [u16; 260] = [0; 260];
                let len = GetModuleBaseNameW(handle, std::ptr::null_mut(), buffer.as_mut_ptr(), 260);
                CloseHandle(handle);

                if len > 0 {
                    OsString::from_wide(&buffer[..len as usize])
                        .to_string_lossy()
                        .to_string()
                } else {
                    String::from("unknown")
                }
            }
        }

        #[cfg(target_os = "macos")]
        {
            use cocoa::base::id;

            unsafe {
                let workspace: id = msg_send![class!(NSWorkspace), sharedWorkspace];
                let app: id = msg_send![workspace, frontmostApplication];
                if app.is_null() {
                    return String::from("unknown");
                }

                let bundle_url: id = msg_send![app, bundleURL];
                let path: id = msg_send![bundle_url, path];
                let path_str: id = msg_send![path, UTF8String];

                if path_str.is_null() {
                    return String::from("unknown");
                }

                let c_str = std::ffi::CStr::from_ptr(path_str as *const i8);
                let path = c_str.to_string_lossy();
                path.rsplit('/')
                    .next()
                    .map(|name| name.to_string())
                    .unwrap_or_else(|| String::from("unknown"))
            }
        }

        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            String::from("unknown")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spotlight_point_accepts_tuple_encoding() {
        let point: SpotlightPoint = serde_json::from_str("[120.5, 88.0]").expect("tuple parses");
        assert_eq!(point.x, 120.5);
        assert_eq!(point.y, 88.0);
    }

    #[test]
    fn spotlight_point_accepts_object_encoding() {
        let point: SpotlightPoint =
            serde_json::from_str(r#"{"x": 15.0, "y": 240.25}"#).expect("object parses");
        assert_eq!(point.x, 15.0);
        assert_eq!(point.y, 240.25);
    }
}

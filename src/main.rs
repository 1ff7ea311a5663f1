// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

fn main() {
    // Refuse to start a second copy; the tray icon is the only UI anyway.
    let instance = single_instance::SingleInstance::new("textspot-instance")
        .expect("failed to create single-instance lock");
    if !instance.is_single() {
        return;
    }

    textspot_lib::run()
}

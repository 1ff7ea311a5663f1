pub mod commands;
pub mod controller;
pub mod session;

pub use controller::{OverlayController, SelectionPayload};

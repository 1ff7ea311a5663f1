pub mod coordinator;

pub use coordinator::{WindowCoordinator, MAIN_LABEL, POPUP_LABEL};

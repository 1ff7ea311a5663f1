pub mod ai;
pub mod format;
pub mod script;

pub use ai::AiClient;
pub use script::ScriptRunner;

pub mod command;
pub mod config;
pub mod state;
pub mod telemetry;
pub mod video_types;

pub use command::*;
pub use config::*;
pub use state::*;
pub use telemetry::*;
pub use video_types::*;

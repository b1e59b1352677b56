//! UGV camera agent: issues commands to the vehicle over HTTP while a
//! background worker keeps the latest camera frame, and fuses both into
//! [`ugv_cam_lib::State`] snapshots.

pub mod agent;
pub mod command_channel;
pub mod config;
pub mod error;
pub mod frame_source;
pub mod mjpeg;

#[cfg(test)]
pub(crate) mod test_support;

pub use agent::Agent;
pub use command_channel::{CommandChannel, HttpCommandChannel};
pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use frame_source::{
    FrameSource, FrameSourceSettings, FrameSourceStats, HttpVideoSource, SourceStatus, VideoSource,
};
pub use mjpeg::MjpegParser;

use crate::{ChassisFeedback, ImuData, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp format used for sample rows and per-sample image file names
pub const SAMPLE_TIME_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

/// Fused snapshot of vehicle telemetry and the latest camera frame.
///
/// Built once per agent step and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct State {
    sensors: Option<ImuData>,
    feedback: Option<ChassisFeedback>,
    #[serde(skip)]
    image: Option<Vec<u8>>,  // JPEG bytes
    timestamp: DateTime<Utc>,
}

impl State {
    pub fn new(
        sensors: Option<ImuData>,
        feedback: Option<ChassisFeedback>,
        image: Option<Vec<u8>>,
    ) -> Self {
        Self {
            sensors,
            feedback,
            image,
            timestamp: Utc::now(),
        }
    }

    pub fn from_response(response: &Response, image: Option<Vec<u8>>) -> Self {
        Self::new(response.sensors(), response.feedback(), image)
    }

    pub fn sensors(&self) -> Option<&ImuData> {
        self.sensors.as_ref()
    }

    pub fn feedback(&self) -> Option<&ChassisFeedback> {
        self.feedback.as_ref()
    }

    /// Encoded JPEG of the frame that was current when the state was built
    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Timestamp rendered the way sample rows and image files are named
    pub fn sample_stem(&self) -> String {
        self.timestamp.format(SAMPLE_TIME_FORMAT).to_string()
    }
}

/// One row of the session log: a state plus the wheel speeds that were
/// commanded when it was captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub timestamp: String,
    pub image_path: Option<String>,
    pub left_speed: f64,
    pub right_speed: f64,
    pub roll: Option<f64>,
    pub pitch: Option<f64>,
    pub voltage: Option<f64>,
    pub temperature: Option<f64>,
    pub accel_x: Option<f64>,
    pub accel_y: Option<f64>,
    pub accel_z: Option<f64>,
    pub gyro_x: Option<f64>,
    pub gyro_y: Option<f64>,
    pub gyro_z: Option<f64>,
}

impl SampleRecord {
    pub const COLUMNS: [&'static str; 14] = [
        "timestamp",
        "image_path",
        "left_speed",
        "right_speed",
        "roll",
        "pitch",
        "voltage",
        "temperature",
        "accel_x",
        "accel_y",
        "accel_z",
        "gyro_x",
        "gyro_y",
        "gyro_z",
    ];

    /// `image_path` is the collaborator's relative path for the state's
    /// image, if it wrote one.
    pub fn from_state(
        state: &State,
        left_speed: f64,
        right_speed: f64,
        image_path: Option<String>,
    ) -> Self {
        let sensors = state.sensors();

        Self {
            timestamp: state.sample_stem(),
            image_path,
            left_speed,
            right_speed,
            roll: sensors.map(|s| s.roll),
            pitch: sensors.map(|s| s.pitch),
            voltage: state.feedback().map(|f| f.voltage),
            temperature: sensors.and_then(|s| s.temperature),
            accel_x: sensors.and_then(|s| s.accel_x),
            accel_y: sensors.and_then(|s| s.accel_y),
            accel_z: sensors.and_then(|s| s.accel_z),
            gyro_x: sensors.and_then(|s| s.gyro_x),
            gyro_y: sensors.and_then(|s| s.gyro_y),
            gyro_z: sensors.and_then(|s| s.gyro_z),
        }
    }
}

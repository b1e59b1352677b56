use crate::TAG_FIELD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// IMU sensor data. Roll/pitch are always reported, the rest only by the
/// full IMU response.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImuData {
    #[serde(rename = "r")]
    pub roll: f64,
    #[serde(rename = "p")]
    pub pitch: f64,

    #[serde(rename = "ax", default, skip_serializing_if = "Option::is_none")]
    pub accel_x: Option<f64>,
    #[serde(rename = "ay", default, skip_serializing_if = "Option::is_none")]
    pub accel_y: Option<f64>,
    #[serde(rename = "az", default, skip_serializing_if = "Option::is_none")]
    pub accel_z: Option<f64>,

    #[serde(rename = "gx", default, skip_serializing_if = "Option::is_none")]
    pub gyro_x: Option<f64>,
    #[serde(rename = "gy", default, skip_serializing_if = "Option::is_none")]
    pub gyro_y: Option<f64>,
    #[serde(rename = "gz", default, skip_serializing_if = "Option::is_none")]
    pub gyro_z: Option<f64>,

    #[serde(rename = "mx", default, skip_serializing_if = "Option::is_none")]
    pub mag_x: Option<f64>,
    #[serde(rename = "my", default, skip_serializing_if = "Option::is_none")]
    pub mag_y: Option<f64>,
    #[serde(rename = "mz", default, skip_serializing_if = "Option::is_none")]
    pub mag_z: Option<f64>,

    #[serde(rename = "temp", default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl ImuData {
    pub fn from_attitude(roll: f64, pitch: f64) -> Self {
        Self {
            roll,
            pitch,
            ..Self::default()
        }
    }
}

/// Basic chassis feedback (response tag 1001)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChassisFeedback {
    #[serde(rename = "L")]
    pub left: f64,     // Left wheel velocity
    #[serde(rename = "R")]
    pub right: f64,    // Right wheel velocity
    #[serde(rename = "r")]
    pub roll: f64,
    #[serde(rename = "p")]
    pub pitch: f64,
    #[serde(rename = "v")]
    pub voltage: f64,  // Battery voltage
}

/// Parsed vehicle response, selected by the `T` field of the payload
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    ChassisFeedback(ChassisFeedback),
    Imu(ImuData),
    Unknown,
}

impl Response {
    pub const CHASSIS_FEEDBACK_TAG: i64 = 1001;
    pub const IMU_DATA_TAG: i64 = 1002;

    /// Parse a response body. Unrecognized or missing tags yield
    /// `Response::Unknown`; a recognized tag with a bad payload is an error.
    pub fn from_json(value: &Value) -> Result<Self, serde_json::Error> {
        let tag = value.get(TAG_FIELD).and_then(integral_tag);

        match tag {
            Some(Self::CHASSIS_FEEDBACK_TAG) => {
                Ok(Self::ChassisFeedback(ChassisFeedback::deserialize(value)?))
            }
            Some(Self::IMU_DATA_TAG) => Ok(Self::Imu(ImuData::deserialize(value)?)),
            _ => Ok(Self::Unknown),
        }
    }

    /// Sensor reading carried by this response. Chassis feedback contributes
    /// its roll/pitch.
    pub fn sensors(&self) -> Option<ImuData> {
        match self {
            Self::ChassisFeedback(feedback) => {
                Some(ImuData::from_attitude(feedback.roll, feedback.pitch))
            }
            Self::Imu(imu) => Some(*imu),
            Self::Unknown => None,
        }
    }

    pub fn feedback(&self) -> Option<ChassisFeedback> {
        match self {
            Self::ChassisFeedback(feedback) => Some(*feedback),
            Self::Imu(_) | Self::Unknown => None,
        }
    }
}

/// Tags may arrive as integral floats such as `1001.0`
fn integral_tag(tag: &Value) -> Option<i64> {
    tag.as_i64().or_else(|| {
        tag.as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

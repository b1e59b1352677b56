use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// JSON field carrying the command tag on the wire
pub const TAG_FIELD: &str = "T";

/// UGV JSON command tags as defined by the vehicle's HTTP API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum CommandType {
    // Motion control
    SpeedCtrl = 1,
    PwmInput = 11,
    RosCtrl = 13,
    SetMotorPid = 2,

    // OLED display
    OledCtrl = 3,
    OledDefault = -3,

    ModuleType = 4,

    // IMU
    GetImuData = 126,
    CaliImuStep = 127,
    GetImuOffset = 128,
    SetImuOffset = 129,

    // Chassis information feedback
    BaseFeedback = 130,
    BaseFeedbackFlow = 131,
    FeedbackFlowInterval = 142,
    UartEchoMode = 143,

    // WiFi configuration
    WifiOnBoot = 401,
    SetAp = 402,
    SetSta = 403,
    WifiApsta = 404,
    WifiInfo = 405,
    WifiConfigCreateByStatus = 406,
    WifiConfigCreateByInput = 407,
    WifiStop = 408,

    // 12V switch and gimbal
    LedCtrl = 132,
    GimbalCtrlSimple = 133,
    GimbalCtrlMove = 134,
    GimbalCtrlStop = 135,
    GimbalSteady = 137,
    GimbalUserCtrl = 141,

    // Robotic arm
    MoveInit = 100,
    SingleJointCtrl = 101,
    JointsRadCtrl = 102,
    SingleAxisCtrl = 103,
    XyztGoalCtrl = 104,
    XyztDirectCtrl = 1041,
    ServoRadFeedback = 105,
    EoatHandCtrl = 106,
    EoatGrabTorque = 107,
    SetJointPid = 108,
    ResetPid = 109,
    SetNewX = 110,
    DynamicAdaptation = 112,

    // Other settings
    HeartBeatSet = 136,
    SetSpdRate = 138,
    GetSpdRate = 139,

    // ESP-NOW
    BroadcastFollower = 300,
    GetMacAddress = 302,
    EspNowAddFollower = 303,
    EspNowRemoveFollower = 304,
    EspNowGroupCtrl = 305,
    EspNowSingle = 306,

    // Task files
    ScanFiles = 200,
    CreateFile = 201,
    ReadFile = 202,
    DeleteFile = 203,
    AppendLine = 204,
    InsertLine = 205,
    ReplaceLine = 206,

    // Servo settings
    SetServoId = 501,
    SetMiddle = 502,
    SetServoPid = 503,

    // ESP32
    Reboot = 600,
    FreeFlashSpace = 601,
    BootMissionInfo = 602,
    ResetBootMission = 603,
    NvsClear = 604,
    InfoPrint = 605,
}

impl CommandType {
    pub const ALL: &'static [CommandType] = &[
        Self::SpeedCtrl, Self::PwmInput, Self::RosCtrl, Self::SetMotorPid,
        Self::OledCtrl, Self::OledDefault, Self::ModuleType,
        Self::GetImuData, Self::CaliImuStep, Self::GetImuOffset, Self::SetImuOffset,
        Self::BaseFeedback, Self::BaseFeedbackFlow, Self::FeedbackFlowInterval, Self::UartEchoMode,
        Self::WifiOnBoot, Self::SetAp, Self::SetSta, Self::WifiApsta, Self::WifiInfo,
        Self::WifiConfigCreateByStatus, Self::WifiConfigCreateByInput, Self::WifiStop,
        Self::LedCtrl, Self::GimbalCtrlSimple, Self::GimbalCtrlMove, Self::GimbalCtrlStop,
        Self::GimbalSteady, Self::GimbalUserCtrl,
        Self::MoveInit, Self::SingleJointCtrl, Self::JointsRadCtrl, Self::SingleAxisCtrl,
        Self::XyztGoalCtrl, Self::XyztDirectCtrl, Self::ServoRadFeedback, Self::EoatHandCtrl,
        Self::EoatGrabTorque, Self::SetJointPid, Self::ResetPid, Self::SetNewX,
        Self::DynamicAdaptation,
        Self::HeartBeatSet, Self::SetSpdRate, Self::GetSpdRate,
        Self::BroadcastFollower, Self::GetMacAddress, Self::EspNowAddFollower,
        Self::EspNowRemoveFollower, Self::EspNowGroupCtrl, Self::EspNowSingle,
        Self::ScanFiles, Self::CreateFile, Self::ReadFile, Self::DeleteFile,
        Self::AppendLine, Self::InsertLine, Self::ReplaceLine,
        Self::SetServoId, Self::SetMiddle, Self::SetServoPid,
        Self::Reboot, Self::FreeFlashSpace, Self::BootMissionInfo, Self::ResetBootMission,
        Self::NvsClear, Self::InfoPrint,
    ];

    /// Wire value of the `T` field
    pub fn tag(self) -> i32 {
        self as i32
    }

    /// Field names that must be present before the command may be sent
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::SpeedCtrl | Self::PwmInput => &["L", "R"],
            Self::RosCtrl => &["X", "Z"],
            _ => &[],
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.tag())
    }
}

impl TryFrom<i32> for CommandType {
    type Error = i32;

    fn try_from(tag: i32) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|command_type| command_type.tag() == tag)
            .ok_or(tag)
    }
}

/// A command is missing fields its tag requires
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Missing required fields for {command_type}: {missing:?}")]
pub struct MissingFields {
    pub command_type: CommandType,
    pub missing: Vec<&'static str>,
}

/// UGV command sent to the vehicle's JSON endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub command_type: CommandType,
    pub data: BTreeMap<String, f64>,
}

impl Command {
    pub fn new(command_type: CommandType) -> Self {
        Self {
            command_type,
            data: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: f64) -> Self {
        self.data.insert(name.into(), value);
        self
    }

    pub fn from_fields<I, K>(command_type: CommandType, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            command_type,
            data: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Direct tank speed control, values in m/s
    pub fn speed(left: f64, right: f64) -> Self {
        Self::new(CommandType::SpeedCtrl)
            .with_field("L", left)
            .with_field("R", right)
    }

    /// Zero-velocity speed command
    pub fn stop() -> Self {
        Self::speed(0.0, 0.0)
    }

    /// Chassis feedback request, used for passive polling
    pub fn base_feedback() -> Self {
        Self::new(CommandType::BaseFeedback)
    }

    pub fn get_imu_data() -> Self {
        Self::new(CommandType::GetImuData)
    }

    /// Required fields not present in `data`, in declaration order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.command_type
            .required_fields()
            .iter()
            .copied()
            .filter(|field| !self.data.contains_key(*field))
            .collect()
    }

    pub fn validate(&self) -> Result<(), MissingFields> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MissingFields {
                command_type: self.command_type,
                missing,
            })
        }
    }

    /// Convert to the `{"T": tag, ...fields}` object expected by the UGV API.
    /// A data field named `T` replaces the tag.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert(TAG_FIELD.to_string(), Value::from(self.command_type.tag()));
        for (name, value) in &self.data {
            object.insert(name.clone(), Value::from(*value));
        }
        Value::Object(object)
    }
}

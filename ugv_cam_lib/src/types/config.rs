use eyre::Result;
use serde::{Deserialize, Serialize};
use std::fs;

/// Pinhole camera parameters and camera mount pose on the vehicle.
/// Angles in degrees, distances in meters, frame x=right, y=down, z=forward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_x: f64,
    pub width: f64,
    pub height: f64,
    pub mount: MountPose,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountPose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Default for CameraConfig {
    /// M5Stack TimerCam on the UGV at 640x480
    fn default() -> Self {
        Self {
            fov_x: 66.5,
            width: 640.0,
            height: 480.0,
            mount: MountPose::default(),
        }
    }
}

impl Default for MountPose {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: -0.15, // 15cm above the ground plane
            z: 0.0,
            roll: 5.0,
            pitch: 0.0,
            yaw: 0.0,
        }
    }
}

/// Differential (tank) drive parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TankConfig {
    pub wheel_base: f64, // distance between left and right wheels (m)
}

impl Default for TankConfig {
    fn default() -> Self {
        Self { wheel_base: 0.22 }
    }
}

impl CameraConfig {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: CameraConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fov_x > 0.0 && self.fov_x < 180.0) {
            return Err(eyre::eyre!(
                "Horizontal FOV ({}) must be within (0, 180) degrees",
                self.fov_x
            ));
        }

        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(eyre::eyre!(
                "Image size ({}x{}) must be positive",
                self.width,
                self.height
            ));
        }

        Ok(())
    }
}

impl TankConfig {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: TankConfig = toml::from_str(&content)?;
        if config.wheel_base <= 0.0 {
            return Err(eyre::eyre!("Wheel base ({}) must be positive", config.wheel_base));
        }
        Ok(config)
    }
}

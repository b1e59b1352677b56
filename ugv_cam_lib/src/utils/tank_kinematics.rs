// Tank (differential) drive kinematics
//
// Right-handed frame: x -> right, y -> down, z -> forward (direction of
// motion). Yaw is the heading about the vertical axis in radians.

use crate::TankConfig;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Below this angular velocity (rad/s) a segment is integrated as a straight line
pub const STRAIGHT_LINE_EPSILON: f64 = 1e-6;

/// Vehicle pose in the world frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, z: f64, yaw: f64) -> Self {
        Self { x, y, z, yaw }
    }

    pub fn origin() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Point3<f64> {
        Point3::new(self.x, self.y, self.z)
    }
}

/// Predicted positions, index 0 is the starting pose
pub type Trajectory = Vec<Point3<f64>>;

/// Advance `pose` by `dt` seconds with the given wheel velocities (m/s).
///
/// Uses exact arc integration: v = (l + r) / 2, ω = (r - l) / wheel_base and,
/// for |ω| above [`STRAIGHT_LINE_EPSILON`], a turn radius R = v / ω. The local
/// displacement is rotated into the world by the yaw at the start of the step.
/// Motion is planar, y never changes.
pub fn integrate(left: f64, right: f64, pose: &Pose, dt: f64, wheel_base: f64) -> Pose {
    let v_center = (right + left) / 2.0;
    let omega = (right - left) / wheel_base;

    let (dx, dz) = if omega.abs() < STRAIGHT_LINE_EPSILON {
        (0.0, v_center * dt)
    } else {
        let radius = v_center / omega;
        let theta = omega * dt;
        (radius * (1.0 - theta.cos()), radius * theta.sin())
    };

    let (sin_yaw, cos_yaw) = pose.yaw.sin_cos();

    Pose {
        x: pose.x + dx * cos_yaw - dz * sin_yaw,
        y: pose.y,
        z: pose.z + dx * sin_yaw + dz * cos_yaw,
        yaw: pose.yaw + omega * dt,
    }
}

/// Open-loop forecast from the origin over at most `max_steps` speed pairs.
///
/// The result holds `min(speeds.len(), max_steps) + 1` positions.
pub fn predict_trajectory(
    speeds: &[(f64, f64)],
    dt: f64,
    max_steps: usize,
    wheel_base: f64,
) -> Trajectory {
    let mut pose = Pose::origin();
    let mut trajectory = Vec::with_capacity(speeds.len().min(max_steps) + 1);
    trajectory.push(pose.position());

    for &(left, right) in speeds.iter().take(max_steps) {
        pose = integrate(left, right, &pose, dt, wheel_base);
        trajectory.push(pose.position());
    }

    trajectory
}

/// Recorded speed pairs for the next `horizon` seconds starting at `start`,
/// clamped to the end of the recording.
pub fn future_speeds(
    samples: &[(f64, f64)],
    start: usize,
    horizon: f64,
    sample_rate_hz: f64,
) -> &[(f64, f64)] {
    if start >= samples.len() {
        return &[];
    }
    let count = (horizon * sample_rate_hz).max(0.0) as usize;
    let end = start.saturating_add(count).min(samples.len());
    &samples[start..end]
}

impl TankConfig {
    pub fn integrate(&self, left: f64, right: f64, pose: &Pose, dt: f64) -> Pose {
        integrate(left, right, pose, dt, self.wheel_base)
    }

    pub fn predict(&self, speeds: &[(f64, f64)], dt: f64, max_steps: usize) -> Trajectory {
        predict_trajectory(speeds, dt, max_steps, self.wheel_base)
    }
}

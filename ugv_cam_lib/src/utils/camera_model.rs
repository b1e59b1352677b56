//! Pinhole camera model and trajectory overlay.
//!
//! Angles passed to and returned from this module are in degrees. World
//! frame follows the vehicle convention: x right, y down, z forward.

use crate::CameraConfig;
use eyre::Result;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use nalgebra::{Matrix3, Matrix4, Point2, Point3, Vector3};

/// Points at or closer than this camera-frame depth are not projected
pub const MIN_PROJECTION_DEPTH: f64 = 1e-9;

/// Threshold on sqrt(R00² + R10²) below which decomposition treats the
/// rotation as gimbal-locked
pub const GIMBAL_LOCK_EPSILON: f64 = 1e-6;

pub const TRAJECTORY_MARKER_RADIUS: i32 = 3;
pub const TRAJECTORY_MARKER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Intrinsic and extrinsic matrices of one camera, recomputed from
/// parameters rather than edited in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraModel {
    pub intrinsics: Matrix3<f64>,
    pub extrinsics: Matrix4<f64>,
}

impl CameraModel {
    pub fn new(intrinsics: Matrix3<f64>, extrinsics: Matrix4<f64>) -> Self {
        Self {
            intrinsics,
            extrinsics,
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        let mount = &config.mount;
        Self {
            intrinsics: estimate_intrinsics(config.fov_x, config.width, config.height),
            extrinsics: estimate_extrinsics(
                mount.x, mount.y, mount.z, mount.roll, mount.pitch, mount.yaw,
            ),
        }
    }

    pub fn project_points(&self, trajectory: &[Point3<f64>]) -> Result<Vec<Option<Point2<f64>>>> {
        project_points(trajectory, &self.intrinsics, &self.extrinsics)
    }

    pub fn project_trajectory(&self, image: &RgbImage, trajectory: &[Point3<f64>]) -> Result<RgbImage> {
        project_trajectory(image, trajectory, &self.intrinsics, &self.extrinsics)
    }
}

impl Default for CameraModel {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default())
    }
}

/// Pinhole intrinsics from the horizontal field of view.
///
/// Square pixels (fx = fy) and the principal point at the image center:
/// ```text
/// [[fx  0 cx]
///  [ 0 fy cy]
///  [ 0  0  1]]
/// ```
#[rustfmt::skip]
pub fn estimate_intrinsics(fov_x: f64, width: f64, height: f64) -> Matrix3<f64> {
    let focal_length = (width / 2.0) / (fov_x.to_radians() / 2.0).tan();

    Matrix3::new(
        focal_length, 0.0,          width / 2.0,
        0.0,          focal_length, height / 2.0,
        0.0,          0.0,          1.0,
    )
}

/// Vertical field of view implied by the horizontal one and the aspect ratio
pub fn compute_vertical_fov(fov_x: f64, width: f64, height: f64) -> f64 {
    let aspect_ratio = width / height;
    (2.0 * ((fov_x.to_radians() / 2.0).tan() / aspect_ratio).atan()).to_degrees()
}

/// Rotation Rz(yaw) · Ry(pitch) · Rx(roll)
#[rustfmt::skip]
fn rotation_zyx(roll: f64, pitch: f64, yaw: f64) -> Matrix3<f64> {
    let (sr, cr) = roll.to_radians().sin_cos();
    let (sp, cp) = pitch.to_radians().sin_cos();
    let (sy, cy) = yaw.to_radians().sin_cos();

    let rz = Matrix3::new(
        cy,  -sy, 0.0,
        sy,   cy, 0.0,
        0.0, 0.0, 1.0,
    );
    let ry = Matrix3::new(
        cp,  0.0, sp,
        0.0, 1.0, 0.0,
        -sp, 0.0, cp,
    );
    let rx = Matrix3::new(
        1.0, 0.0, 0.0,
        0.0, cr,  -sr,
        0.0, sr,  cr,
    );

    rz * ry * rx
}

/// 4x4 rigid transform from the camera position (m) and Z-Y-X Euler angles
pub fn estimate_extrinsics(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Matrix4<f64> {
    let mut extrinsics = Matrix4::identity();
    extrinsics
        .fixed_view_mut::<3, 3>(0, 0)
        .copy_from(&rotation_zyx(roll, pitch, yaw));
    extrinsics[(0, 3)] = x;
    extrinsics[(1, 3)] = y;
    extrinsics[(2, 3)] = z;
    extrinsics
}

/// Inverse of [`estimate_extrinsics`]: `(x, y, z, roll, pitch, yaw)`.
///
/// Near gimbal lock (pitch ≈ ±90°) yaw is fixed to zero and roll absorbs
/// the remaining rotation, read from the second row instead of the third.
pub fn decompose_extrinsics(extrinsics: &Matrix4<f64>) -> (f64, f64, f64, f64, f64, f64) {
    let rotation = extrinsics.fixed_view::<3, 3>(0, 0);
    let sy = (rotation[(0, 0)].powi(2) + rotation[(1, 0)].powi(2)).sqrt();

    let (roll, pitch, yaw) = if sy >= GIMBAL_LOCK_EPSILON {
        (
            rotation[(2, 1)].atan2(rotation[(2, 2)]),
            (-rotation[(2, 0)]).atan2(sy),
            rotation[(1, 0)].atan2(rotation[(0, 0)]),
        )
    } else {
        (
            (-rotation[(1, 2)]).atan2(rotation[(1, 1)]),
            (-rotation[(2, 0)]).atan2(sy),
            0.0,
        )
    };

    (
        extrinsics[(0, 3)],
        extrinsics[(1, 3)],
        extrinsics[(2, 3)],
        roll.to_degrees(),
        pitch.to_degrees(),
        yaw.to_degrees(),
    )
}

/// Pixel coordinates of each trajectory point.
///
/// World points go to the camera frame through the inverse of `extrinsics`,
/// then through `intrinsics` and the perspective divide. Points with depth
/// at or below [`MIN_PROJECTION_DEPTH`] (behind the camera) yield `None`.
pub fn project_points(
    trajectory: &[Point3<f64>],
    intrinsics: &Matrix3<f64>,
    extrinsics: &Matrix4<f64>,
) -> Result<Vec<Option<Point2<f64>>>> {
    let world_to_camera = extrinsics
        .try_inverse()
        .ok_or_else(|| eyre::eyre!("Extrinsic matrix is not invertible"))?;

    let pixels = trajectory
        .iter()
        .map(|point| {
            let camera = world_to_camera * point.to_homogeneous();
            let projected = intrinsics * Vector3::new(camera.x, camera.y, camera.z);

            if projected.z > MIN_PROJECTION_DEPTH {
                Some(Point2::new(projected.x / projected.z, projected.y / projected.z))
            } else {
                None
            }
        })
        .collect();

    Ok(pixels)
}

/// Draw the projected trajectory on a copy of `image`; the input is left as is.
pub fn project_trajectory(
    image: &RgbImage,
    trajectory: &[Point3<f64>],
    intrinsics: &Matrix3<f64>,
    extrinsics: &Matrix4<f64>,
) -> Result<RgbImage> {
    let mut output = image.clone();

    let radius = f64::from(TRAJECTORY_MARKER_RADIUS);
    let (width, height) = (f64::from(image.width()), f64::from(image.height()));

    for pixel in project_points(trajectory, intrinsics, extrinsics)?.into_iter().flatten() {
        // Markers entirely outside the image are skipped, the rest are clipped
        if pixel.x < -radius || pixel.y < -radius || pixel.x > width + radius || pixel.y > height + radius {
            continue;
        }
        draw_filled_circle_mut(
            &mut output,
            (pixel.x as i32, pixel.y as i32),
            TRAJECTORY_MARKER_RADIUS,
            TRAJECTORY_MARKER_COLOR,
        );
    }

    Ok(output)
}

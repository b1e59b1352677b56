pub mod camera_model;
pub mod tank_kinematics;
pub mod tracing;

pub use self::camera_model::*;
pub use self::tank_kinematics::*;
pub use self::tracing::*;

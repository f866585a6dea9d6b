//! vigil-hw — Hardware and platform abstraction.
//!
//! V4L2 camera capture delivering BGR frames, and the platform-specific
//! screen-lock actuators.

pub mod camera;
pub mod frame;
pub mod lock;

pub use camera::{Camera, CameraError, CameraStream, FrameSource};
pub use frame::{Frame, PixelFormat};
pub use lock::{detect_actuator, select_actuator, CommandLock, LockActuator, LockError};

//! Frame capture pipeline: camera adapter, grab loop, extraction, disk I/O.

pub mod camera;
pub mod disk_writer;
pub mod frame_extractor;
pub mod grab_loop;

pub use camera::{CameraAdapter, SimulatedCamera};
pub use grab_loop::{GrabLoop, GrabLoopConfig};

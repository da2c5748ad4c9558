//! Camera adapter trait plus a simulated implementation (spec §6).
//!
//! The real driver is an external collaborator; this crate only consumes
//! `connect/disconnect/is_connected/retrieve/set_exposure_us/
//! set_acquisition_fps/enable_chunked_timestamp`, split into a real-hardware
//! path and a simulated path for the camera's richer contract.

use crate::error::CameraError;
use crate::frame::Frame;
use rand::Rng;
use std::time::{Duration, Instant};

pub trait CameraAdapter: Send {
    fn connect(&mut self) -> Result<(), CameraError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    fn retrieve(&mut self, timeout: Duration) -> Result<Frame, CameraError>;
    fn set_exposure_us(&mut self, exposure_us: u32);
    fn set_acquisition_fps(&mut self, fps: f32);
    fn enable_chunked_timestamp(&mut self);
}

/// Generates synthetic RGB frames so the pipeline runs with no hardware
/// attached. Occasionally injects a timeout or incomplete-frame error so
/// the grab loop's recovery path is exercised.
pub struct SimulatedCamera {
    connected: bool,
    width: u32,
    height: u32,
    fail_rate: f64,
}

impl SimulatedCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            connected: false,
            width,
            height,
            fail_rate: 0.0,
        }
    }

    pub fn with_fail_rate(mut self, fail_rate: f64) -> Self {
        self.fail_rate = fail_rate;
        self
    }
}

impl CameraAdapter for SimulatedCamera {
    fn connect(&mut self) -> Result<(), CameraError> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn retrieve(&mut self, _timeout: Duration) -> Result<Frame, CameraError> {
        if !self.connected {
            return Err(CameraError::Fatal("camera not connected".into()));
        }
        if self.fail_rate > 0.0 && rand::rng().random_bool(self.fail_rate) {
            return if rand::rng().random_bool(0.5) {
                Err(CameraError::Timeout)
            } else {
                Err(CameraError::IncompleteFrame)
            };
        }
        let size = (self.width * self.height * 3) as usize;
        let bytes = vec![0u8; size];
        Ok(Frame::new(bytes, self.width, self.height, Instant::now()))
    }

    fn set_exposure_us(&mut self, _exposure_us: u32) {}

    fn set_acquisition_fps(&mut self, _fps: f32) {}

    fn enable_chunked_timestamp(&mut self) {}
}

//! Digital I/O adapter trait plus a simulated implementation.
//!
//! The real driver is an external collaborator (spec §1, "the DIO driver");
//! this crate only needs something it can poll at high frequency. The
//! adapter splits into a real-hardware path and a `rand`-driven simulated
//! path selected at construction time.

use crate::error::DioError;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};

/// Reads the raw level of sensor bits A and B.
pub trait DioAdapter: Send {
    fn read_bit_a(&mut self) -> Result<bool, DioError>;
    fn read_bit_b(&mut self) -> Result<bool, DioError>;
}

/// Drives A/B transitions from a scripted or random sequence, for tests and
/// for running the pipeline with no hardware attached.
pub struct SimulatedDio {
    bit_a: AtomicBool,
    bit_b: AtomicBool,
    rng_driven: bool,
}

impl SimulatedDio {
    pub fn new(rng_driven: bool) -> Self {
        Self {
            bit_a: AtomicBool::new(false),
            bit_b: AtomicBool::new(false),
            rng_driven,
        }
    }

    pub fn set_bit_a(&self, value: bool) {
        self.bit_a.store(value, Ordering::SeqCst);
    }

    pub fn set_bit_b(&self, value: bool) {
        self.bit_b.store(value, Ordering::SeqCst);
    }

    /// Shared-reference reads, for callers holding an `Arc<SimulatedDio>`
    /// (the bits are atomics already, so no exclusive access is needed).
    pub fn read_bit_a_shared(&self) -> Result<bool, DioError> {
        if self.rng_driven && rand::rng().random_bool(0.002) {
            let cur = self.bit_a.load(Ordering::SeqCst);
            self.bit_a.store(!cur, Ordering::SeqCst);
        }
        Ok(self.bit_a.load(Ordering::SeqCst))
    }

    pub fn read_bit_b_shared(&self) -> Result<bool, DioError> {
        if self.rng_driven && rand::rng().random_bool(0.002) {
            let cur = self.bit_b.load(Ordering::SeqCst);
            self.bit_b.store(!cur, Ordering::SeqCst);
        }
        Ok(self.bit_b.load(Ordering::SeqCst))
    }
}

impl DioAdapter for SimulatedDio {
    fn read_bit_a(&mut self) -> Result<bool, DioError> {
        self.read_bit_a_shared()
    }

    fn read_bit_b(&mut self) -> Result<bool, DioError> {
        self.read_bit_b_shared()
    }
}

//! Thin demo binary: runs the pipeline against simulated hardware so it
//! can be exercised with no camera or DIO attached.

use std::sync::Arc;
use std::time::Duration;

use wood_inspect_core::capture::SimulatedCamera;
use wood_inspect_core::db::ConnectionPool;
use wood_inspect_core::error::InferenceError;
use wood_inspect_core::inference::{Detection, InferenceAdapter};
use wood_inspect_core::status::broker::HardwareMode;
use wood_inspect_core::{Config, Pipeline};

struct StubInference;

impl InferenceAdapter for StubInference {
    fn predict(&self, _image_path: &std::path::Path) -> Result<Vec<Detection>, InferenceError> {
        Ok(Vec::new())
    }
}

fn main() {
    env_logger::init();
    let config = Config::new();

    let pool = Arc::new(
        ConnectionPool::new("inspection.db", 5, Duration::from_millis(5_000))
            .expect("failed to open connection pool"),
    );

    let mut pipeline = Pipeline::new(config, pool);
    let camera = Box::new(SimulatedCamera::new(640, 480).with_fail_rate(0.01));
    let inference: Arc<dyn InferenceAdapter + Send + Sync> = Arc::new(StubInference);

    pipeline.start(camera, inference, HardwareMode::Simulated);
    log::info!("pipeline running; sensor-inspection simulation mode");

    std::thread::sleep(Duration::from_secs(30));

    pipeline.stop();
}

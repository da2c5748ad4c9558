//! Sensor fusion: DIO polling plus the B/A state machine (spec §4.3).

pub mod dio;
pub mod poller;
pub mod state_machine;

pub use dio::{DioAdapter, SimulatedDio};
pub use poller::SensorPoller;
pub use state_machine::{Decision, DiscardKind, Edge, SensorState, SensorStateMachine};

//! Polls the DIO adapter at a fixed cadence and turns level changes into
//! edges for the state machine (spec §4.3, "sampled at >= 50 Hz").
//!
//! A dedicated OS thread uses `spin_sleep::SpinSleeper` to hold the period,
//! tracking a deadline-miss counter rather than letting drift accumulate
//! silently.

use log::warn;
use spin_sleep::SpinSleeper;
use std::time::{Duration, Instant};

use crate::sensor::dio::DioAdapter;
use crate::sensor::state_machine::{Decision, Edge, SensorState, SensorStateMachine};

/// Minimum poll rate required by spec §4.3.
pub const MIN_POLL_HZ: u32 = 50;

pub struct SensorPoller {
    period: Duration,
    last_a: bool,
    last_b: bool,
    consecutive_misses: u64,
}

impl SensorPoller {
    pub fn new(poll_hz: u32) -> Self {
        let hz = poll_hz.max(MIN_POLL_HZ);
        Self {
            period: Duration::from_secs_f64(1.0 / hz as f64),
            last_a: false,
            last_b: false,
            consecutive_misses: 0,
        }
    }

    /// One poll tick: reads both bits, derives edges, feeds the state
    /// machine, and returns whatever `Decision` resulted (possibly `None`).
    pub fn tick(
        &mut self,
        dio: &mut dyn DioAdapter,
        sm: &mut SensorStateMachine,
        now: Instant,
    ) -> Decision {
        let a = match dio.read_bit_a() {
            Ok(v) => v,
            Err(e) => {
                warn!("bit A read failed: {e}");
                self.last_a
            }
        };
        let b = match dio.read_bit_b() {
            Ok(v) => v,
            Err(e) => {
                warn!("bit B read failed: {e}");
                self.last_b
            }
        };

        let mut decision = Decision::None;

        if a != self.last_a {
            let edge = if a { Edge::ARise } else { Edge::AFall };
            decision = sm.on_edge(edge, now);
        }
        if decision == Decision::None && b != self.last_b {
            let edge = if b { Edge::BRise } else { Edge::BFall };
            decision = sm.on_edge(edge, now);
        }
        if decision == Decision::None {
            decision = sm.poll_timeout(now);
        }

        self.last_a = a;
        self.last_b = b;
        decision
    }

    /// Runs the poll loop on the calling thread until `should_stop` returns
    /// true. `on_tick` is called every cycle with the bit levels, current
    /// state, and `Decision` (`Decision::None` on most ticks) so callers can
    /// mirror live sensor status without waiting for a decision to fire.
    pub fn run(
        &mut self,
        mut dio: Box<dyn DioAdapter>,
        mut sm: SensorStateMachine,
        mut should_stop: impl FnMut() -> bool,
        mut on_tick: impl FnMut(Decision, bool, bool, SensorState, Instant),
    ) {
        let sleeper = SpinSleeper::default();
        let mut next_tick = Instant::now();
        while !should_stop() {
            let now = Instant::now();
            let decision = self.tick(dio.as_mut(), &mut sm, now);
            on_tick(decision, self.last_a, self.last_b, sm.state(), now);

            next_tick += self.period;
            if next_tick < now {
                self.consecutive_misses += 1;
                next_tick = now + self.period;
            } else {
                self.consecutive_misses = 0;
                sleeper.sleep(next_tick - now);
            }
        }
    }

    pub fn consecutive_misses(&self) -> u64 {
        self.consecutive_misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::dio::SimulatedDio;
    use crate::sensor::state_machine::DEFAULT_T_MAX;

    #[test]
    fn rising_edge_on_b_starts_recording() {
        let mut poller = SensorPoller::new(100);
        let dio = SimulatedDio::new(false);
        dio.set_bit_b(true);
        let mut dio: Box<dyn DioAdapter> = Box::new(dio);
        let mut sm = SensorStateMachine::new(DEFAULT_T_MAX);
        let decision = poller.tick(dio.as_mut(), &mut sm, Instant::now());
        assert_eq!(decision, Decision::RecordStart);
    }

    #[test]
    fn no_change_yields_no_decision() {
        let mut poller = SensorPoller::new(100);
        let mut dio: Box<dyn DioAdapter> = Box::new(SimulatedDio::new(false));
        let mut sm = SensorStateMachine::new(DEFAULT_T_MAX);
        let decision = poller.tick(dio.as_mut(), &mut sm, Instant::now());
        assert_eq!(decision, Decision::None);
    }

    #[test]
    fn poll_hz_floor_enforced() {
        let poller = SensorPoller::new(1);
        assert!(poller.period <= Duration::from_secs_f64(1.0 / MIN_POLL_HZ as f64));
    }
}

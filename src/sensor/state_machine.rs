//! Sensor fusion state machine (spec §4.3).
//!
//! Five states driven by four edge events, emitting a `Decision` the event
//! processor acts on. Pure and synchronous: no I/O, no locks, so every
//! transition is exercised directly from unit tests without a poller.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorState {
    Idle,
    BActive,
    BThenA,
    AOnlyFromB,
    AOnlyError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    ARise,
    AFall,
    BRise,
    BFall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardKind {
    Timeout,
    ReturnFromL,
    UnexpectedEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    RecordStart,
    Save,
    Discard(DiscardKind),
    None,
}

/// Default max recording duration before a forced timeout discard (spec §4.3).
pub const DEFAULT_T_MAX: Duration = Duration::from_secs(20);

pub struct SensorStateMachine {
    state: SensorState,
    record_started_at: Option<Instant>,
    t_max: Duration,
}

impl SensorStateMachine {
    pub fn new(t_max: Duration) -> Self {
        Self {
            state: SensorState::Idle,
            record_started_at: None,
            t_max,
        }
    }

    pub fn state(&self) -> SensorState {
        self.state
    }

    pub fn record_started_at(&self) -> Option<Instant> {
        self.record_started_at
    }

    /// Checks the T_max timeout. Call this on every poll tick regardless of
    /// whether an edge fired this tick; a timeout can elapse between edges.
    pub fn poll_timeout(&mut self, now: Instant) -> Decision {
        if self.state == SensorState::Idle {
            return Decision::None;
        }
        if let Some(started) = self.record_started_at {
            if now.duration_since(started) > self.t_max {
                self.reset();
                return Decision::Discard(DiscardKind::Timeout);
            }
        }
        Decision::None
    }

    /// Advances the state machine on a single edge event (spec §4.3 table).
    pub fn on_edge(&mut self, edge: Edge, now: Instant) -> Decision {
        use Edge::*;
        use SensorState::*;

        match (self.state, edge) {
            (Idle, BRise) => {
                self.state = BActive;
                self.record_started_at = Some(now);
                Decision::RecordStart
            }
            (Idle, ARise) => {
                self.state = AOnlyError;
                self.record_started_at = Some(now);
                Decision::Discard(DiscardKind::UnexpectedEntry)
            }
            (BActive, ARise) => {
                self.state = BThenA;
                Decision::None
            }
            (BActive, BFall) => {
                self.reset();
                Decision::Discard(DiscardKind::ReturnFromL)
            }
            (BThenA, BFall) => {
                self.state = AOnlyFromB;
                Decision::None
            }
            (BThenA, AFall) => {
                // Recoverable backtrack: A dropped before B cleared left.
                self.state = BActive;
                Decision::None
            }
            (AOnlyFromB, AFall) => {
                let decision = self.save_window();
                self.reset();
                decision
            }
            (AOnlyFromB, BRise) => {
                self.state = BThenA;
                Decision::None
            }
            (AOnlyError, AFall) => {
                self.reset();
                Decision::None
            }
            // Any other edge in any other state is a spurious bounce; ignore it.
            _ => Decision::None,
        }
    }

    fn save_window(&self) -> Decision {
        if self.record_started_at.is_some() {
            Decision::Save
        } else {
            Decision::Discard(DiscardKind::UnexpectedEntry)
        }
    }

    fn reset(&mut self) {
        self.state = SensorState::Idle;
        self.record_started_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_b_then_a_cycle_saves() {
        let mut sm = SensorStateMachine::new(DEFAULT_T_MAX);
        let t0 = Instant::now();
        assert_eq!(sm.on_edge(Edge::BRise, t0), Decision::RecordStart);
        assert_eq!(sm.state(), SensorState::BActive);
        assert_eq!(sm.on_edge(Edge::ARise, t0 + Duration::from_millis(10)), Decision::None);
        assert_eq!(sm.state(), SensorState::BThenA);
        assert_eq!(sm.on_edge(Edge::BFall, t0 + Duration::from_millis(20)), Decision::None);
        assert_eq!(sm.state(), SensorState::AOnlyFromB);
        assert_eq!(sm.on_edge(Edge::AFall, t0 + Duration::from_millis(30)), Decision::Save);
        assert_eq!(sm.state(), SensorState::Idle);
    }

    #[test]
    fn a_falls_while_still_b_then_a_backtracks_to_b_active() {
        let mut sm = SensorStateMachine::new(DEFAULT_T_MAX);
        let t0 = Instant::now();
        sm.on_edge(Edge::BRise, t0);
        sm.on_edge(Edge::ARise, t0 + Duration::from_millis(5));
        let decision = sm.on_edge(Edge::AFall, t0 + Duration::from_millis(15));
        assert_eq!(decision, Decision::None);
        assert_eq!(sm.state(), SensorState::BActive);
    }

    #[test]
    fn b_falls_before_a_rises_discards_return_from_l() {
        let mut sm = SensorStateMachine::new(DEFAULT_T_MAX);
        let t0 = Instant::now();
        sm.on_edge(Edge::BRise, t0);
        let decision = sm.on_edge(Edge::BFall, t0 + Duration::from_millis(5));
        assert_eq!(decision, Decision::Discard(DiscardKind::ReturnFromL));
        assert_eq!(sm.state(), SensorState::Idle);
    }

    #[test]
    fn timeout_forces_discard_from_any_active_state() {
        let mut sm = SensorStateMachine::new(Duration::from_millis(100));
        let t0 = Instant::now();
        sm.on_edge(Edge::BRise, t0);
        let decision = sm.poll_timeout(t0 + Duration::from_millis(200));
        assert_eq!(decision, Decision::Discard(DiscardKind::Timeout));
        assert_eq!(sm.state(), SensorState::Idle);
    }

    #[test]
    fn timeout_not_triggered_while_idle() {
        let mut sm = SensorStateMachine::new(Duration::from_millis(1));
        let t0 = Instant::now();
        assert_eq!(sm.poll_timeout(t0 + Duration::from_secs(10)), Decision::None);
    }

    #[test]
    fn a_rise_from_idle_is_unexpected_entry() {
        let mut sm = SensorStateMachine::new(DEFAULT_T_MAX);
        let t0 = Instant::now();
        let decision = sm.on_edge(Edge::ARise, t0);
        assert_eq!(decision, Decision::Discard(DiscardKind::UnexpectedEntry));
        assert_eq!(sm.state(), SensorState::AOnlyError);
    }

    #[test]
    fn a_only_error_returns_to_idle_with_no_decision_on_fall() {
        let mut sm = SensorStateMachine::new(DEFAULT_T_MAX);
        let t0 = Instant::now();
        sm.on_edge(Edge::ARise, t0);
        let decision = sm.on_edge(Edge::AFall, t0 + Duration::from_millis(5));
        assert_eq!(decision, Decision::None);
        assert_eq!(sm.state(), SensorState::Idle);
    }

    #[test]
    fn a_only_from_b_b_rise_returns_to_b_then_a() {
        let mut sm = SensorStateMachine::new(DEFAULT_T_MAX);
        let t0 = Instant::now();
        sm.on_edge(Edge::BRise, t0);
        sm.on_edge(Edge::ARise, t0 + Duration::from_millis(1));
        sm.on_edge(Edge::BFall, t0 + Duration::from_millis(2));
        assert_eq!(sm.state(), SensorState::AOnlyFromB);
        let decision = sm.on_edge(Edge::BRise, t0 + Duration::from_millis(3));
        assert_eq!(decision, Decision::None);
        assert_eq!(sm.state(), SensorState::BThenA);
    }

    #[test]
    fn clean_pass_seed_scenario() {
        // spec seed scenario 1: B@0.1, A@0.4, B_fall@1.7, A_fall@2.0 -> SAVE
        let mut sm = SensorStateMachine::new(DEFAULT_T_MAX);
        let t0 = Instant::now();
        assert_eq!(sm.on_edge(Edge::BRise, t0 + Duration::from_millis(100)), Decision::RecordStart);
        assert_eq!(sm.on_edge(Edge::ARise, t0 + Duration::from_millis(400)), Decision::None);
        assert_eq!(sm.on_edge(Edge::BFall, t0 + Duration::from_millis(1700)), Decision::None);
        assert_eq!(sm.on_edge(Edge::AFall, t0 + Duration::from_millis(2000)), Decision::Save);
    }

    #[test]
    fn return_from_left_seed_scenario() {
        // spec seed scenario 2: B@0.1, B_fall@0.3 -> RECORD_START then DISCARD
        let mut sm = SensorStateMachine::new(DEFAULT_T_MAX);
        let t0 = Instant::now();
        assert_eq!(sm.on_edge(Edge::BRise, t0 + Duration::from_millis(100)), Decision::RecordStart);
        assert_eq!(
            sm.on_edge(Edge::BFall, t0 + Duration::from_millis(300)),
            Decision::Discard(DiscardKind::ReturnFromL)
        );
    }
}

//! Alarm gating

use std::time::{Duration, Instant};

use dms::{Status, TrackerOutput};
use tracing::debug;

/// What a notifier should do with one tracker output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Nothing new
    Quiet,
    /// Alarm just started
    Fire,
    /// Alarm still active and the repeat interval has passed
    Repeat,
}

/// Decides when an active alarm is announced.
///
/// Fires on entering ALARM, then once per repeat interval while the alarm
/// lasts. Any non-alarm output re-arms the gate.
#[derive(Debug, Clone)]
pub struct AlarmGate {
    repeat_interval: Duration,
    last_fired: Option<Instant>,
    fire_count: usize,
}

impl AlarmGate {
    /// Create a gate; non-positive or non-finite intervals disable repeats
    pub fn new(repeat_seconds: f64) -> Self {
        let repeat_interval = if repeat_seconds.is_finite() && repeat_seconds > 0.0 {
            Duration::from_secs_f64(repeat_seconds)
        } else {
            Duration::MAX
        };
        Self {
            repeat_interval,
            last_fired: None,
            fire_count: 0,
        }
    }

    pub fn check(&mut self, output: &TrackerOutput, now: Instant) -> GateDecision {
        if output.status != Status::Alarm {
            self.last_fired = None;
            return GateDecision::Quiet;
        }

        let decision = match self.last_fired {
            None => GateDecision::Fire,
            Some(last) if now.saturating_duration_since(last) >= self.repeat_interval => {
                GateDecision::Repeat
            }
            Some(_) => {
                debug!("Alarm notification suppressed: within repeat interval");
                GateDecision::Quiet
            }
        };

        if decision != GateDecision::Quiet {
            self.last_fired = Some(now);
            self.fire_count += 1;
        }
        decision
    }

    /// Alarm notifications issued so far
    pub fn fire_count(&self) -> usize {
        self.fire_count
    }
}

impl Default for AlarmGate {
    fn default() -> Self {
        Self::new(5.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(status: Status) -> TrackerOutput {
        TrackerOutput {
            status,
            elapsed_seconds: 0.0,
            alarm_active: status == Status::Alarm,
        }
    }

    #[test]
    fn test_fires_on_alarm_entry() {
        let mut gate = AlarmGate::new(10.0);
        let t0 = Instant::now();

        assert_eq!(gate.check(&output(Status::Warning), t0), GateDecision::Quiet);
        assert_eq!(gate.check(&output(Status::Alarm), t0), GateDecision::Fire);
        assert_eq!(
            gate.check(&output(Status::Alarm), t0 + Duration::from_secs(1)),
            GateDecision::Quiet
        );
        assert_eq!(gate.fire_count(), 1);
    }

    #[test]
    fn test_repeats_after_interval() {
        let mut gate = AlarmGate::new(2.0);
        let t0 = Instant::now();

        gate.check(&output(Status::Alarm), t0);
        assert_eq!(
            gate.check(&output(Status::Alarm), t0 + Duration::from_secs(2)),
            GateDecision::Repeat
        );
        assert_eq!(
            gate.check(&output(Status::Alarm), t0 + Duration::from_secs(3)),
            GateDecision::Quiet
        );
        assert_eq!(gate.fire_count(), 2);
    }

    #[test]
    fn test_rearms_after_safe() {
        let mut gate = AlarmGate::new(60.0);
        let t0 = Instant::now();

        gate.check(&output(Status::Alarm), t0);
        gate.check(&output(Status::Safe), t0 + Duration::from_millis(100));
        assert_eq!(
            gate.check(&output(Status::Alarm), t0 + Duration::from_millis(200)),
            GateDecision::Fire
        );
    }

    #[test]
    fn test_zero_interval_never_repeats() {
        let mut gate = AlarmGate::new(0.0);
        let t0 = Instant::now();

        gate.check(&output(Status::Alarm), t0);
        assert_eq!(
            gate.check(&output(Status::Alarm), t0 + Duration::from_secs(3600)),
            GateDecision::Quiet
        );
    }
}

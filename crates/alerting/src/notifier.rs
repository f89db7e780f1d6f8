//! Alarm notifiers

use std::io::Write;
use std::time::Instant;

use dms::{Status, TrackerOutput};
use tracing::{info, warn};

use crate::{AlarmGate, AlertError, GateDecision, Notifier};

/// Reports status transitions and gated alarms as log events
#[derive(Debug)]
pub struct LogNotifier {
    gate: AlarmGate,
    last_status: Status,
}

impl LogNotifier {
    pub fn new(repeat_seconds: f64) -> Self {
        Self {
            gate: AlarmGate::new(repeat_seconds),
            last_status: Status::Safe,
        }
    }

    pub fn alarms_fired(&self) -> usize {
        self.gate.fire_count()
    }
}

impl Notifier for LogNotifier {
    fn notify(&mut self, output: &TrackerOutput) -> Result<(), AlertError> {
        if output.status != self.last_status {
            match output.status {
                Status::Safe => info!(status = %output.status, "Eyes open"),
                Status::Warning => info!(
                    status = %output.status,
                    elapsed = output.elapsed_seconds,
                    "Eyes closed"
                ),
                Status::Alarm => {}
            }
            self.last_status = output.status;
        }

        match self.gate.check(output, Instant::now()) {
            GateDecision::Fire => warn!(
                status = %output.status,
                elapsed = output.elapsed_seconds,
                "Microsleep alarm: eyes closed for {:.1}s",
                output.elapsed_seconds
            ),
            GateDecision::Repeat => warn!(
                status = %output.status,
                elapsed = output.elapsed_seconds,
                "Microsleep alarm still active after {:.1}s",
                output.elapsed_seconds
            ),
            GateDecision::Quiet => {}
        }

        Ok(())
    }
}

/// Rings the terminal bell when an alarm fires or repeats
pub struct BellNotifier<W> {
    gate: AlarmGate,
    out: W,
}

impl BellNotifier<std::io::Stdout> {
    pub fn stdout(repeat_seconds: f64) -> Self {
        Self::new(repeat_seconds, std::io::stdout())
    }
}

impl<W: Write + Send> BellNotifier<W> {
    pub fn new(repeat_seconds: f64, out: W) -> Self {
        Self {
            gate: AlarmGate::new(repeat_seconds),
            out,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Notifier for BellNotifier<W> {
    fn notify(&mut self, output: &TrackerOutput) -> Result<(), AlertError> {
        if self.gate.check(output, Instant::now()) != GateDecision::Quiet {
            self.out.write_all(b"\x07")?;
            self.out.flush()?;
        }
        Ok(())
    }
}

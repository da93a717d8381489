//! Top-level assembly: one transport, the demultiplexer, and one polling
//! session per chip.

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::convert::CalibrationModel;
use crate::demux::{self, ChipQueues};
use crate::report::Report;
use crate::session::Session;
use crate::transport::{Exchange, Transport, TransportConfig};
use crate::types::addr;
use crate::Error;

/// Monitor tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Interval between idle keep-alive exchanges on the bus.
    pub idle_interval: Duration,
    /// Deadline for assembling one chip response, measured from the start
    /// of assembly.
    pub response_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            idle_interval: Duration::from_millis(500),
            response_timeout: Duration::from_secs(5),
        }
    }
}

/// The interface to the two chips measuring the boiler temperature.
///
/// Reports appear on [`reports`](Monitor::reports) as polling progresses;
/// everything that goes wrong appears on [`errors`](Monitor::errors). A
/// fatal transport error stops the pipeline, after which the report channel
/// disconnects; reopen the monitor to recover. Dropping the monitor shuts
/// it down.
pub struct Monitor {
    reports: Receiver<Report>,
    errors: Receiver<Error>,
    closer: Option<Sender<()>>,
    transport: Transport,
    tasks: Vec<JoinHandle<()>>,
}

impl Monitor {
    /// Open the transport over the given exchange primitive and start the
    /// demultiplexer and both chip sessions.
    pub fn open(
        device: impl Exchange + 'static,
        calibration: CalibrationModel,
        config: MonitorConfig,
    ) -> Monitor {
        let transport = Transport::open(
            device,
            TransportConfig {
                idle_interval: config.idle_interval,
            },
        );
        let calibration = Arc::new(calibration);
        let (report_tx, report_rx) = bounded(0);
        let (err_tx, err_rx) = unbounded();
        let (closer_tx, closer_rx) = bounded::<()>(0);
        let (first_tx, first_rx) = unbounded();
        let (second_tx, second_rx) = unbounded();

        let mut tasks = Vec::with_capacity(4);
        tasks.push({
            let frames = transport.frames();
            let queues = ChipQueues {
                first: first_tx,
                second: second_tx,
            };
            let err_tx = err_tx.clone();
            let closer_rx = closer_rx.clone();
            thread::spawn(move || demux::run(frames, queues, err_tx, closer_rx))
        });
        for (chip, queue) in [(addr(1), first_rx), (addr(2), second_rx)] {
            let session = Session {
                chip,
                submitter: transport.submitter(),
                queue,
                calibration: Arc::clone(&calibration),
                reports: report_tx.clone(),
                errors: err_tx.clone(),
                closer: closer_rx.clone(),
                response_timeout: config.response_timeout,
            };
            tasks.push(thread::spawn(move || session.run()));
        }
        tasks.push({
            let transport_errors = transport.errors();
            thread::spawn(move || forward_errors(transport_errors, err_tx, closer_rx))
        });

        Monitor {
            reports: report_rx,
            errors: err_rx,
            closer: Some(closer_tx),
            transport,
            tasks,
        }
    }

    /// One report per successful poll cycle per chip.
    pub fn reports(&self) -> Receiver<Report> {
        self.reports.clone()
    }

    /// Every non-fatal error, plus the single fatal transport error if one
    /// occurs. Nothing is silently swallowed.
    pub fn errors(&self) -> Receiver<Error> {
        self.errors.clone()
    }

    /// Stop every task without completing the current cycles. No partial
    /// report is ever emitted. Idempotent.
    pub fn shutdown(&mut self) {
        self.closer.take();
        self.transport.shutdown();
        for task in self.tasks.drain(..) {
            let _ = task.join();
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Republishes fatal transport errors on the monitor's error channel.
fn forward_errors(transport_errors: Receiver<Error>, errors: Sender<Error>, closer: Receiver<()>) {
    loop {
        select! {
            recv(transport_errors) -> err => match err {
                Ok(err) => {
                    if errors.send(err).is_err() {
                        return;
                    }
                }
                Err(_) => return,
            },
            recv(closer) -> _ => return,
        }
    }
}

//! Per-chip polling session.
//!
//! Each chip is driven by its own task: submit a one-bit poll request, join
//! frames from the chip's queue onto an accumulator until the full 16-bit
//! response is assembled or the deadline passes, decode, convert, publish.
//! The two sessions share the bus only through the transport's submission
//! point, so neither delays the other's logical progress.

use crossbeam_channel::{at, select, Receiver, Sender};
use log::{debug, warn};

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::convert::CalibrationModel;
use crate::message::Message;
use crate::report::{Reading, Report, RESPONSE_BITS};
use crate::transport::Submitter;
use crate::types::ChipAddress;
use crate::Error;

pub(crate) struct Session {
    pub chip: ChipAddress,
    pub submitter: Submitter,
    pub queue: Receiver<Message>,
    pub calibration: Arc<CalibrationModel>,
    pub reports: Sender<Report>,
    pub errors: Sender<Error>,
    pub closer: Receiver<()>,
    /// Deadline for assembling one response, measured from the start of
    /// assembly, not per frame.
    pub response_timeout: Duration,
}

impl Session {
    /// Poll the chip until shutdown. Assembly failures restart the cycle;
    /// only a closed transport or shutdown ends it.
    pub(crate) fn run(self) {
        'poll: loop {
            if self.submitter.submit(Message::request(self.chip)).is_err() {
                return; // transport closed
            }

            let mut response = Message::empty(self.chip);
            let deadline = at(Instant::now() + self.response_timeout);
            while response.len() < RESPONSE_BITS {
                select! {
                    recv(self.queue) -> msg => {
                        let msg = match msg {
                            Ok(msg) => msg,
                            Err(_) => return, // queue closed behind the demux
                        };
                        response = match response.join(&msg) {
                            Ok(joined) => joined,
                            Err(_) => {
                                // ran past the 31-bit joining limit
                                let length = response.len() + msg.len();
                                if !self.report(malformed(self.chip, length)) {
                                    return;
                                }
                                continue 'poll;
                            }
                        };
                    }
                    recv(deadline) -> _ => {
                        warn!("chip {} did not respond", self.chip);
                        if !self.report(Error::PeerTimeout { chip: self.chip }) {
                            return;
                        }
                        continue 'poll;
                    }
                    recv(self.closer) -> _ => return,
                }
            }

            if response.len() != RESPONSE_BITS {
                // a chip sent an oversized final frame
                if !self.report(malformed(self.chip, response.len())) {
                    return;
                }
                continue 'poll;
            }

            let reading = match Reading::decode(&response) {
                Ok(reading) => reading,
                Err(err) => {
                    if !self.report(err) {
                        return;
                    }
                    continue 'poll;
                }
            };
            let celsius = match self.calibration.celsius(reading.count) {
                Ok(celsius) => celsius,
                Err(err) => {
                    if !self.report(err) {
                        return;
                    }
                    continue 'poll;
                }
            };

            debug!("chip {} reports {:.1} C at count {}", self.chip, celsius, reading.count);
            let report = Report::new(self.chip, reading, celsius, response);
            select! {
                send(self.reports, report) -> sent => {
                    if sent.is_err() {
                        return;
                    }
                }
                recv(self.closer) -> _ => return,
            }
        }
    }

    // false once nobody listens for errors anymore
    fn report(&self, err: Error) -> bool {
        self.errors.send(err).is_ok()
    }
}

fn malformed(chip: ChipAddress, length: usize) -> Error {
    Error::MalformedResponse {
        chip: *chip,
        length,
    }
}

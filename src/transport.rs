//! Bus arbiter and byte framer.
//!
//! The transport owns the physical exchange primitive exclusively. A single
//! arbitration task serializes every use of the bus: it waits for exactly one
//! of an application message to transmit, a periodic idle tick, or shutdown.
//! The bus is full duplex, so every reply from a chip arrives as the receive
//! half of some exchange; the idle ticks keep pumping the bus so replies are
//! never left stranded in a chip's output buffer.
//!
//! A second task consumes the received bytes and recovers frames from them,
//! see [`nom_parser`](crate::nom_parser). Decode and exchange failures leave
//! the bus in an unknown state, so they stop the whole transport; the owner
//! may reopen it.

use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender};
use log::{debug, error, trace};
use snafu::ResultExt;

use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::buffer::Buffer;
use crate::message::{Message, FRAME_LEN};
use crate::nom_parser::{parse_frame, FrameToken};
use crate::{Error, InvalidMessageSnafu};

/// The physical half-duplex exchange primitive.
///
/// One call writes a fixed-size outbound buffer while simultaneously reading
/// a same-size inbound buffer. The transport's arbitration task is its sole
/// caller.
pub trait Exchange: Send {
    fn exchange(&mut self, tx: &[u8; FRAME_LEN]) -> io::Result<[u8; FRAME_LEN]>;
}

/// Transport tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Interval between idle keep-alive exchanges.
    pub idle_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            idle_interval: Duration::from_millis(500),
        }
    }
}

/// Clonable handle for submitting outbound messages to the arbiter.
#[derive(Debug, Clone)]
pub struct Submitter {
    submissions: Sender<Message>,
}

impl Submitter {
    pub(crate) fn new(submissions: Sender<Message>) -> Submitter {
        Submitter { submissions }
    }

    /// Hand a validated message to the arbiter for transmission at the next
    /// opportunity. Blocks until the arbiter accepts it.
    /// # Errors
    /// [`Error::InvalidMessage`] if validation fails, [`Error::Closed`] if
    /// the transport has shut down.
    pub fn submit(&self, message: Message) -> Result<(), Error> {
        message.vet().context(InvalidMessageSnafu)?;
        self.submissions.send(message).map_err(|_| Error::Closed)
    }
}

/// Handle to the running transport tasks.
///
/// Decoded inbound frames appear on [`frames`](Transport::frames), failures
/// on [`errors`](Transport::errors). Dropping the transport shuts it down.
pub struct Transport {
    submitter: Submitter,
    frames: Receiver<Message>,
    errors: Receiver<Error>,
    closer: Option<Sender<()>>,
    arbiter: Option<JoinHandle<()>>,
    framer: Option<JoinHandle<()>>,
}

impl Transport {
    /// Take exclusive ownership of the exchange primitive and start the
    /// arbitration and framer tasks.
    pub fn open(device: impl Exchange + 'static, config: TransportConfig) -> Transport {
        let (submit_tx, submit_rx) = bounded(0);
        let (raw_tx, raw_rx) = unbounded();
        let (frame_tx, frame_rx) = bounded(0);
        let (err_tx, err_rx) = unbounded();
        let (closer_tx, closer_rx) = bounded::<()>(0);

        let arbiter = {
            let err_tx = err_tx.clone();
            let closer_rx = closer_rx.clone();
            let idle = config.idle_interval;
            thread::spawn(move || arbiter(device, submit_rx, raw_tx, err_tx, closer_rx, idle))
        };
        let framer = thread::spawn(move || framer(raw_rx, frame_tx, err_tx, closer_rx));

        Transport {
            submitter: Submitter::new(submit_tx),
            frames: frame_rx,
            errors: err_rx,
            closer: Some(closer_tx),
            arbiter: Some(arbiter),
            framer: Some(framer),
        }
    }

    /// See [`Submitter::submit`].
    pub fn submit(&self, message: Message) -> Result<(), Error> {
        self.submitter.submit(message)
    }

    /// A clonable submission handle, independent of the transport's lifetime
    /// borrow-wise; it reports [`Error::Closed`] once the transport stops.
    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    /// Successfully decoded inbound frames, in arrival order.
    pub fn frames(&self) -> Receiver<Message> {
        self.frames.clone()
    }

    /// Transmission and decode failures. A fatal failure is reported exactly
    /// once, after which both tasks stop.
    pub fn errors(&self) -> Receiver<Error> {
        self.errors.clone()
    }

    /// Stop both tasks and release the exchange primitive. Idempotent;
    /// subsequent [`submit`](Transport::submit) calls fail with
    /// [`Error::Closed`].
    pub fn shutdown(&mut self) {
        // dropping the closer is the broadcast
        self.closer.take();
        if let Some(task) = self.arbiter.take() {
            let _ = task.join();
        }
        if let Some(task) = self.framer.take() {
            let _ = task.join();
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn arbiter(
    mut device: impl Exchange,
    submissions: Receiver<Message>,
    raw: Sender<[u8; FRAME_LEN]>,
    errors: Sender<Error>,
    closer: Receiver<()>,
    idle_interval: Duration,
) {
    let ticker = tick(idle_interval);
    loop {
        let tx_buf = select! {
            recv(submissions) -> message => match message {
                Ok(message) => {
                    debug!("transmitting {}", message);
                    message.encode()
                }
                Err(_) => return, // every submitter is gone
            },
            recv(ticker) -> _ => [0; FRAME_LEN],
            recv(closer) -> _ => return,
        };
        match device.exchange(&tx_buf) {
            Ok(rx_buf) => {
                trace!("exchanged {:?} for {:?}", tx_buf, rx_buf);
                if raw.send(rx_buf).is_err() {
                    return; // framer stopped first
                }
            }
            Err(source) => {
                error!("bus exchange failed: {}", source);
                let _ = errors.send(Error::Io { source });
                return;
            }
        }
    }
}

fn framer(
    raw: Receiver<[u8; FRAME_LEN]>,
    frames: Sender<Message>,
    errors: Sender<Error>,
    closer: Receiver<()>,
) {
    let mut buf = Buffer::new();
    loop {
        match raw.recv() {
            Ok(chunk) => buf.write(&chunk),
            Err(_) => return, // arbiter stopped
        }
        loop {
            let (consumed, decoded) = match parse_frame(buf.as_ref()) {
                (_, FrameToken::NeedData) => break,
                (consumed, FrameToken::Idle) => (consumed, None),
                (consumed, FrameToken::Frame(bytes)) => match Message::decode(bytes) {
                    Ok(message) => (consumed, Some(message)),
                    Err(err) => {
                        error!("dropping the bus: {}", err);
                        let _ = errors.send(err);
                        return;
                    }
                },
            };
            buf.consume(consumed);
            if let Some(message) = decoded {
                debug!("received {}", message);
                select! {
                    send(frames, message) -> sent => {
                        if sent.is_err() {
                            return; // no consumer left
                        }
                    }
                    recv(closer) -> _ => return,
                }
            }
        }
    }
}

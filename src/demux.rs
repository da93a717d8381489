//! Routes inbound frames to the per-chip queues by their address field.

use crossbeam_channel::{select, Receiver, Sender};
use log::warn;

use crate::message::Message;
use crate::Error;

/// The outbound ends of the two per-chip queues. The queues are unbounded so
/// that a stalled consumer can never hold up the other chip's frames.
pub(crate) struct ChipQueues {
    pub first: Sender<Message>,
    pub second: Sender<Message>,
}

impl ChipQueues {
    /// Pure address dispatch: 1 to the first queue, 2 to the second,
    /// anything else is reported and dropped.
    /// # Errors
    /// `Err(())` once a queue or the error channel has no receiver left.
    fn route(&self, message: Message, errors: &Sender<Error>) -> Result<(), ()> {
        let queue = match message.chip() {
            1 => &self.first,
            2 => &self.second,
            chip => {
                warn!("dropping frame for unknown chip {}", chip);
                return errors
                    .send(Error::UnknownAddress { chip })
                    .map_err(|_| ());
            }
        };
        queue.send(message).map_err(|_| ())
    }
}

/// Demultiplexer task: runs until shutdown or until the transport's frame
/// inbox closes.
pub(crate) fn run(
    frames: Receiver<Message>,
    queues: ChipQueues,
    errors: Sender<Error>,
    closer: Receiver<()>,
) {
    loop {
        select! {
            recv(frames) -> frame => match frame {
                Ok(frame) => {
                    if queues.route(frame, &errors).is_err() {
                        return;
                    }
                }
                Err(_) => return, // transport stopped
            },
            recv(closer) -> _ => return,
        }
    }
}

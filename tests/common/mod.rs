#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{Error, ErrorKind};
use std::sync::{Arc, Mutex};

use thermomux::{addr, Exchange, Message, FRAME_LEN};

/// In-process simulation of the shared bus and the two sensor chips.
///
/// A chip answers a one-bit poll by queueing its scripted response frames;
/// each subsequent exchange (idle tick or another request) delivers one
/// queued frame back to the master, just as the real bus pumps replies out
/// of a chip's output buffer.
#[derive(Clone)]
pub struct SimBus {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    replies: [Vec<[u8; FRAME_LEN]>; 2],
    pending: VecDeque<[u8; FRAME_LEN]>,
    polls: [usize; 2],
    fail_next: bool,
}

impl SimBus {
    pub fn new() -> SimBus {
        SimBus {
            inner: Arc::new(Mutex::new(Inner {
                replies: [Vec::new(), Vec::new()],
                pending: VecDeque::new(),
                polls: [0, 0],
                fail_next: false,
            })),
        }
    }

    /// Script a chip's 16-bit response, split into frames of the given bit
    /// lengths. A chip without a script stays silent.
    pub fn set_response(&self, chip: u8, bits: &str, split: &[usize]) {
        assert_eq!(bits.len(), split.iter().sum::<usize>());
        let mut frames = Vec::with_capacity(split.len());
        let mut offset = 0;
        for &len in split {
            let chunk = Message::from_bit_str(addr(chip), &bits[offset..offset + len]).unwrap();
            frames.push(chunk.encode());
            offset += len;
        }
        self.lock().replies[chip as usize - 1] = frames;
    }

    pub fn silence(&self, chip: u8) {
        self.lock().replies[chip as usize - 1].clear();
    }

    /// Queue one raw frame for the master, bypassing the chips.
    pub fn inject_frame(&self, frame: [u8; FRAME_LEN]) {
        self.lock().pending.push_back(frame);
    }

    pub fn fail_next_exchange(&self) {
        self.lock().fail_next = true;
    }

    /// Number of poll requests this chip has seen so far.
    pub fn polls(&self, chip: u8) -> usize {
        self.lock().polls[chip as usize - 1]
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("SimBus mutex is poisoned")
    }
}

impl Exchange for SimBus {
    fn exchange(&mut self, tx: &[u8; FRAME_LEN]) -> std::io::Result<[u8; FRAME_LEN]> {
        let mut inner = self.lock();
        if inner.fail_next {
            inner.fail_next = false;
            return Err(Error::new(ErrorKind::BrokenPipe, "bus wedged"));
        }

        if let Ok(request) = Message::decode(tx) {
            let chip = request.chip();
            if (1..=2).contains(&chip) && request.len() == 1 && request.bit(0) {
                inner.polls[chip as usize - 1] += 1;
                let frames = inner.replies[chip as usize - 1].clone();
                inner.pending.extend(frames);
            }
        }

        Ok(inner.pending.pop_front().unwrap_or([0; FRAME_LEN]))
    }
}

/// The 16 response bits in wire order: a 10-bit count, most significant bit
/// first, then the five flags and the reserved bit.
pub fn response_bits(
    count: u16,
    heating: bool,
    ok: bool,
    temp_low: bool,
    temp_high: bool,
    peer_died: bool,
) -> String {
    assert!(count < 1024);
    let mut bits = String::with_capacity(16);
    for i in (0..10).rev() {
        bits.push(if count >> i & 1 != 0 { '1' } else { '0' });
    }
    for flag in [heating, ok, temp_low, temp_high, peer_died, false] {
        bits.push(if flag { '1' } else { '0' });
    }
    bits
}

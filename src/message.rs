//! The wire unit of the multiplexed bus.
//!
//! A frame is one header byte followed by up to four payload bytes. The
//! header carries a sync marker in bit 7, the payload bit count in bits 6-2
//! and the chip address in bits 1-0. Payload bits are packed flush to the
//! most significant side of the payload bytes; slack in the final byte sits
//! at the low end, is zero on encode and ignored on decode.

use snafu::ensure;

use core::fmt;

use crate::types::{ChipAddress, Error as TypeError, InvalidBitCharSnafu, MessageTooLongSnafu};

/// Number of bytes moved by one bus exchange: header plus up to four payload
/// bytes, zero padded.
pub const FRAME_LEN: usize = 5;

/// Maximum number of payload bits in a frame, and in a joined message.
pub const BIT_LIMIT: usize = 31;

pub(crate) const SYNC: u8 = 0x80;
pub(crate) const LEN_MASK: u8 = 0x1f;
pub(crate) const ADDR_MASK: u8 = 0x03;

const PAYLOAD_MAX: usize = FRAME_LEN - 1;

/// The decoded, in-memory form of a frame, or an outbound request prior to
/// encoding.
///
/// Bit 0 is the first bit received, i.e. the most significant bit of the
/// first payload byte. Messages from the same chip concatenate with
/// [`join`](Message::join). The address field is kept as its raw wire value;
/// routing decides whether it names a known chip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    chip: u8,
    length: u8,
    bits: [u8; PAYLOAD_MAX],
}

impl Message {
    /// An empty accumulator for the given chip.
    pub fn empty(chip: ChipAddress) -> Message {
        Message {
            chip: *chip,
            length: 0,
            bits: [0; PAYLOAD_MAX],
        }
    }

    /// The one-bit poll request that asks a chip for its current reading.
    pub fn request(chip: ChipAddress) -> Message {
        let mut msg = Message::empty(chip);
        msg.push_bit(true);
        msg
    }

    /// Build a message from the reference `'0'`/`'1'` notation.
    ///
    /// The string form is a debugging and test notation only; the wire format
    /// is the packed-byte layout produced by [`encode`](Message::encode).
    pub fn from_bit_str(chip: ChipAddress, bits: &str) -> Result<Message, TypeError> {
        ensure!(bits.len() <= BIT_LIMIT, MessageTooLongSnafu);
        let mut msg = Message::empty(chip);
        for ch in bits.chars() {
            match ch {
                '0' => msg.push_bit(false),
                '1' => msg.push_bit(true),
                _ => return InvalidBitCharSnafu.fail(),
            }
        }
        Ok(msg)
    }

    /// The raw address field, 0-3 on the wire.
    pub fn chip(&self) -> u8 {
        self.chip
    }

    /// The address field as a checked [`ChipAddress`].
    /// # Errors
    /// Returns [`TypeError::InvalidAddress`] for the reserved address 0 and
    /// the unassigned address 3.
    pub fn address(&self) -> Result<ChipAddress, TypeError> {
        ChipAddress::new(self.chip)
    }

    /// Payload length in bits.
    pub fn len(&self) -> usize {
        self.length as usize
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Payload bit `idx`, in arrival order.
    ///
    /// Panics if `idx` is at or past [`len`](Message::len).
    pub fn bit(&self, idx: usize) -> bool {
        assert!(idx < self.len());
        self.bits[idx / 8] & (0x80 >> (idx % 8)) != 0
    }

    /// Read `nbits` payload bits starting at `idx` as an unsigned integer,
    /// most significant bit first.
    ///
    /// Panics if the range reaches past [`len`](Message::len) or 32 bits.
    pub fn uint(&self, idx: usize, nbits: usize) -> u32 {
        assert!(nbits <= 32 && idx + nbits <= self.len());
        let mut res = 0;
        for i in idx..idx + nbits {
            res = res << 1 | self.bit(i) as u32;
        }
        res
    }

    /// Concatenate two messages from the same chip: the result carries
    /// `self`'s bits followed by `other`'s.
    /// # Errors
    /// Returns [`TypeError::MessageTooLong`] if the joined length would
    /// exceed [`BIT_LIMIT`].
    pub fn join(&self, other: &Message) -> Result<Message, TypeError> {
        debug_assert_eq!(self.chip, other.chip);
        ensure!(self.len() + other.len() <= BIT_LIMIT, MessageTooLongSnafu);
        let mut res = self.clone();
        for i in 0..other.len() {
            res.push_bit(other.bit(i));
        }
        Ok(res)
    }

    /// Validate for transmission: the address must name one of the two
    /// chips, and the payload must fit a single frame.
    pub fn vet(&self) -> Result<(), TypeError> {
        self.address()?;
        ensure!(self.len() <= BIT_LIMIT, MessageTooLongSnafu);
        Ok(())
    }

    /// Pack into one wire frame. Unused trailing bytes stay zero, which the
    /// framer on the far side discards as idle padding.
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut buf = [0; FRAME_LEN];
        buf[0] = SYNC | self.length << 2 | (self.chip & ADDR_MASK);
        buf[1..].copy_from_slice(&self.bits);
        buf
    }

    /// Decode one tokenized frame: a header byte with the sync bit set,
    /// followed by the declared number of payload bytes.
    /// # Errors
    /// Returns [`Error::MalformedFrame`](crate::Error::MalformedFrame) if the
    /// sync bit is absent or the buffer is shorter than the header declares.
    pub fn decode(frame: &[u8]) -> Result<Message, crate::Error> {
        ensure!(
            frame.first().map_or(false, |header| header & SYNC != 0),
            crate::MalformedFrameSnafu
        );
        let header = frame[0];
        let length = header >> 2 & LEN_MASK;
        let payload_bytes = (length as usize + 7) / 8;
        ensure!(frame.len() > payload_bytes, crate::MalformedFrameSnafu);

        let mut bits = [0; PAYLOAD_MAX];
        bits[..payload_bytes].copy_from_slice(&frame[1..=payload_bytes]);
        if length % 8 != 0 {
            // mask out the padding at the low end of the final byte
            bits[payload_bytes - 1] &= 0xff << (8 - length % 8);
        }
        Ok(Message {
            chip: header & ADDR_MASK,
            length,
            bits,
        })
    }

    fn push_bit(&mut self, bit: bool) {
        debug_assert!(self.len() < BIT_LIMIT);
        let idx = self.len();
        if bit {
            self.bits[idx / 8] |= 0x80 >> (idx % 8);
        }
        self.length += 1;
    }
}

impl fmt::Display for Message {
    /// Reference notation: the bits followed by `@` and the address,
    /// e.g. `101@1`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.len() {
            f.write_str(if self.bit(i) { "1" } else { "0" })?;
        }
        write!(f, "@{}", self.chip)
    }
}

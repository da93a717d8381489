//! The decoded chip response and the report value handed to consumers.

use arrayvec::ArrayVec;
use snafu::ensure;

use core::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::message::Message;
use crate::types::ChipAddress;
use crate::{Error, MalformedResponseSnafu};

/// Number of bits in one complete chip response.
pub const RESPONSE_BITS: usize = 16;

/// The raw, pre-conversion content of a 16-bit chip response.
///
/// Bits 0-9 are the ADC count, most significant bit first; bits 10-14 are
/// the status flags; bit 15 is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    /// 10-bit ADC count, 0-1023.
    pub count: u16,
    /// The chip is currently driving the heater.
    pub heating: bool,
    /// Self-test passed.
    pub ok: bool,
    /// Temperature below the configured window.
    pub temp_low: bool,
    /// Temperature above the configured window.
    pub temp_high: bool,
    /// The other chip of the pair stopped answering.
    pub peer_died: bool,
}

impl Reading {
    /// Decode a fully assembled response message.
    /// # Errors
    /// Returns [`Error::MalformedResponse`] unless the message is exactly
    /// [`RESPONSE_BITS`] long.
    pub fn decode(message: &Message) -> Result<Reading, Error> {
        ensure!(
            message.len() == RESPONSE_BITS,
            MalformedResponseSnafu {
                chip: message.chip(),
                length: message.len(),
            }
        );
        Ok(Reading {
            count: message.uint(0, 10) as u16,
            heating: message.bit(10),
            ok: message.bit(11),
            temp_low: message.bit(12),
            temp_high: message.bit(13),
            peer_died: message.bit(14),
        })
    }
}

/// One successful poll cycle of one chip: the calibrated temperature, the
/// raw reading it came from, and a timestamp. Immutable once produced.
#[derive(Debug, Clone)]
pub struct Report {
    pub time: SystemTime,
    pub chip: ChipAddress,
    /// Raw ADC count behind the temperature.
    pub count: u16,
    pub celsius: f64,
    pub heating: bool,
    pub ok: bool,
    pub temp_low: bool,
    pub temp_high: bool,
    pub peer_died: bool,
    /// The assembled response message, kept for diagnostics.
    pub message: Message,
}

impl Report {
    pub(crate) fn new(
        chip: ChipAddress,
        reading: Reading,
        celsius: f64,
        message: Message,
    ) -> Report {
        Report {
            time: SystemTime::now(),
            chip,
            count: reading.count,
            celsius,
            heating: reading.heating,
            ok: reading.ok,
            temp_low: reading.temp_low,
            temp_high: reading.temp_high,
            peer_died: reading.peer_died,
            message,
        }
    }

    /// Names of the flags that are set, in wire order.
    pub fn flag_names(&self) -> ArrayVec<&'static str, 5> {
        let mut names = ArrayVec::new();
        for (set, name) in [
            (self.heating, "Heating"),
            (self.ok, "OK"),
            (self.temp_low, "TempLow"),
            (self.temp_high, "TempHigh"),
            (self.peer_died, "PeerDied"),
        ] {
            if set {
                names.push(name);
            }
        }
        names
    }

    /// One delimited record: temperature, wall-clock time, chip, raw count,
    /// then the name of every set flag. Consumers own formatting beyond this.
    pub fn to_record(&self) -> Vec<String> {
        let mut rec = Vec::with_capacity(4 + 5);
        rec.push(format!("{:.1}", self.celsius));
        rec.push(clock(self.time));
        rec.push(self.chip.to_string());
        rec.push(self.count.to_string());
        rec.extend(self.flag_names().iter().map(|name| (*name).to_string()));
        rec
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_record().join(" "))
    }
}

// UTC wall clock, HH:MM:SS
fn clock(time: SystemTime) -> String {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600 % 24, secs / 60 % 60, secs % 60)
}

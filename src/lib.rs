//! Twin-chip boiler thermometry over one half-duplex bus.
//!
//! Two sensor chips share a single physical line. The [`Transport`] owns
//! that line: it interleaves idle keep-alive exchanges with on-demand
//! requests and recovers frames from the continuous inbound byte stream.
//! A demultiplexer routes each frame to the queue of the chip it came from,
//! and one [session](Monitor) per chip polls, reassembles the 16-bit
//! response, and converts the raw ADC count into a calibrated Celsius
//! [`Report`].
//!
//! The physical exchange primitive is supplied by the embedder through the
//! [`Exchange`] trait; everything else runs on plain threads and channels.
//!
//! ```
//! use std::io;
//! use thermomux::{CalibrationModel, Exchange, Monitor, MonitorConfig, Thermistor, FRAME_LEN};
//!
//! struct SilentBus;
//!
//! impl Exchange for SilentBus {
//!     fn exchange(&mut self, _tx: &[u8; FRAME_LEN]) -> io::Result<[u8; FRAME_LEN]> {
//!         Ok([0; FRAME_LEN])
//!     }
//! }
//!
//! let calibration = CalibrationModel {
//!     thermistor: Thermistor { a: 1.270e-3, b: 2.229e-4, c: 3.948e-8 },
//!     series_resistor: 997.0,
//!     adc_full_scale: 1023,
//! };
//! let mut monitor = Monitor::open(SilentBus, calibration, MonitorConfig::default());
//! let reports = monitor.reports();
//! // reports.recv() blocks until a chip answers a poll
//! monitor.shutdown();
//! ```

use snafu::Snafu;

mod buffer;
pub mod convert;
mod demux;
pub mod message;
pub mod monitor;
mod nom_parser;
pub mod report;
mod session;
pub mod transport;
pub mod types;

pub use convert::{CalibrationModel, Thermistor};
pub use message::{Message, BIT_LIMIT, FRAME_LEN};
pub use monitor::{Monitor, MonitorConfig};
pub use report::{Reading, Report, RESPONSE_BITS};
pub use transport::{Exchange, Submitter, Transport, TransportConfig};
pub use types::{addr, ChipAddress, IntoChipAddress};

/// Errors reported by the transport, the demultiplexer, the sessions and the
/// conversion pipeline.
///
/// [`MalformedFrame`](Error::MalformedFrame) and [`Io`](Error::Io) are fatal:
/// the bus is in an unknown state, the transport reports once and stops, and
/// the owner decides whether to reopen it. Everything else is local to one
/// poll cycle.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// An outbound message failed validation. Do not resubmit it unmodified.
    #[snafu(display("Invalid outbound message: {source}"))]
    InvalidMessage { source: types::Error },
    /// A received byte sequence failed the sync-bit check. Fatal.
    #[snafu(display("Malformed frame on the bus"))]
    MalformedFrame,
    /// The physical exchange primitive failed. Fatal.
    #[snafu(display("Bus exchange failed: {source}"))]
    Io { source: std::io::Error },
    /// A frame addressed outside the known chip pair; dropped, routing
    /// continues.
    #[snafu(display("Frame for unknown chip address {chip}"))]
    UnknownAddress { chip: u8 },
    /// A chip did not complete its response within the assembly window; its
    /// session restarts the cycle.
    #[snafu(display("Chip {chip} did not respond"))]
    PeerTimeout { chip: ChipAddress },
    /// A chip's assembled response was not exactly [`RESPONSE_BITS`] long;
    /// its session restarts the cycle.
    #[snafu(display("Chip {chip} sent a response of {length} bits"))]
    MalformedResponse { chip: u8, length: usize },
    /// The ADC count maps to a degenerate divider ratio; the report is
    /// dropped, the cycle restarts.
    #[snafu(display("ADC count {count} is outside the convertible range"))]
    OutOfRange { count: u16 },
    /// The transport has shut down.
    #[snafu(display("Transport is closed"))]
    Closed,
}

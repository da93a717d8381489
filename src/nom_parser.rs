//! Tokenizer for the continuous inbound byte stream.
//!
//! The receive half of every bus exchange is appended to one rolling buffer.
//! The stream may start at an arbitrary offset and interleaves frames with
//! runs of idle zero padding, so tokenization resynchronizes on the sync bit:
//! any byte without it is skipped, one run at a time.

use nom::bytes::streaming::take;
use nom::combinator::verify;
use nom::number::streaming::u8 as any_byte;
use nom::Err::Incomplete;
use nom::IResult;

use crate::message::{LEN_MASK, SYNC};

#[derive(Debug, PartialEq)]
pub(crate) enum FrameToken<'a> {
    /// Not enough buffered bytes to decide; consume nothing.
    NeedData,
    /// A run of idle or noise bytes to discard.
    Idle,
    /// One complete frame: header byte plus the declared payload bytes.
    Frame(&'a [u8]),
}

/// Apply the tokenization rule to the buffer head. Returns the number of
/// bytes to consume together with the token found there. No partial frame is
/// ever consumed.
pub(crate) fn parse_frame(buf: &[u8]) -> (usize, FrameToken<'_>) {
    if buf.is_empty() {
        return (0, FrameToken::NeedData);
    }
    if buf[0] & SYNC == 0 {
        let run = buf.iter().take_while(|&&b| b & SYNC == 0).count();
        return (run, FrameToken::Idle);
    }
    match frame(buf) {
        Ok((rest, bytes)) => (buf.len() - rest.len(), FrameToken::Frame(bytes)),
        Err(Incomplete(_)) => (0, FrameToken::NeedData),
        Err(_) => unreachable!("sync bit was checked above"),
    }
}

fn frame(buf: &[u8]) -> IResult<&[u8], &[u8]> {
    let (rest, header) = verify(any_byte, |b| b & SYNC != 0)(buf)?;
    let payload_bytes = ((header >> 2 & LEN_MASK) as usize + 7) / 8;
    let (rest, _payload) = take(payload_bytes)(rest)?;
    let needed = buf.len() - rest.len();
    Ok((rest, &buf[..needed]))
}

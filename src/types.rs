//! Range-checked types for addressing the two sensor chips on the shared bus.

use snafu::{ensure, OptionExt, Snafu};

use core::convert::{TryFrom, TryInto};
use core::fmt;
use core::ops::Deref;

/// Error type for this module
#[derive(Debug, Snafu, PartialEq, Eq, Clone, Copy)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// The value isn't a valid chip address.
    #[snafu(display("Invalid chip address"))]
    InvalidAddress,
    /// A message payload would exceed the 31-bit frame limit.
    #[snafu(display("Message longer than 31 bits"))]
    MessageTooLong,
    /// A reference bit string contains something other than '0' or '1'.
    #[snafu(display("Bits may only be '0' or '1'"))]
    InvalidBitChar,
}

const fn invalid_address() -> InvalidAddressSnafu {
    InvalidAddressSnafu
}

/// `ChipAddress` is a range-checked \[1, 2\] integer, identifying one of the
/// two sensor chips sharing the bus. Address 0 is reserved on the wire.
///
/// ## Example
/// ```
/// use thermomux::ChipAddress;
/// use std::convert::TryInto;
/// let chip = ChipAddress::new(1).unwrap();
/// let chip: ChipAddress = 2u8.try_into().unwrap();
/// ```
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct ChipAddress(u8);

/// Create a new [`ChipAddress`], panics if it is out of range.
pub const fn addr(a: u8) -> ChipAddress {
    if a >= 1 && a <= 2 {
        return ChipAddress(a);
    }
    panic!("Invalid chip address.")
}

impl ChipAddress {
    /// Create a new address, checking that it is 1 or 2.
    /// # Errors
    /// Returns [`Error::InvalidAddress`] if `address` is out of range.
    pub fn new(address: impl TryInto<u8>) -> Result<Self, Error> {
        let address = address.try_into().ok().with_context(invalid_address)?;
        ensure!((1..=2).contains(&address), invalid_address());
        Ok(Self(address))
    }

    /// The address of the other chip of the pair.
    pub const fn buddy(self) -> ChipAddress {
        ChipAddress(3 - self.0)
    }
}

impl Deref for ChipAddress {
    type Target = u8;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for ChipAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl PartialEq<u8> for ChipAddress {
    fn eq(&self, other: &u8) -> bool {
        self.0 == *other
    }
}

/// Trait to convert `T: TryInto<u8>` into a [`ChipAddress`].
pub trait IntoChipAddress {
    /// Convert self to a `ChipAddress`.
    /// # Errors
    /// Returns [`Error::InvalidAddress`] if self isn't a valid chip address.
    fn into_chip_address(self) -> Result<ChipAddress, Error>;
}

impl IntoChipAddress for ChipAddress {
    fn into_chip_address(self) -> Result<ChipAddress, Error> {
        Ok(self)
    }
}

impl<T> IntoChipAddress for T
where
    T: TryInto<u8>,
{
    fn into_chip_address(self) -> Result<ChipAddress, Error> {
        ChipAddress::new(self)
    }
}

impl TryFrom<u8> for ChipAddress {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

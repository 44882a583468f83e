//! Instruction address type.

use std::fmt;
use std::ops::{Add, Sub};

/// Strongly typed instruction or module address
///
/// A thin wrapper around `u64` so program counters, module bases and file
/// offsets cannot be mixed up with sizes or symbol offsets at call sites.
///
/// ## Example
///
/// ```rust
/// use symdecode_core::types::Address;
///
/// let pc = Address::from(0x1000_u64);
/// assert_eq!((pc + 0x10).value(), 0x1010);
/// assert_eq!(pc.checked_sub(0x2000), None);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address
{
    /// The null address
    pub const ZERO: Self = Address(0);

    /// Create an address in const contexts.
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Address of a function in the running process.
    ///
    /// ```rust
    /// use symdecode_core::types::Address;
    ///
    /// fn marker() {}
    /// let pc = Address::of_fn(marker as fn());
    /// assert_ne!(pc, Address::ZERO);
    /// ```
    pub fn of_fn(f: fn()) -> Self
    {
        Address(f as usize as u64)
    }

    /// Raw `u64` value.
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Add an offset, `None` on overflow.
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Subtract an offset, `None` on underflow.
    pub fn checked_sub(self, offset: u64) -> Option<Self>
    {
        self.0.checked_sub(offset).map(Address)
    }

    /// Subtract an offset, clamping at zero.
    pub fn saturating_sub(self, offset: u64) -> Self
    {
        Address(self.0.saturating_sub(offset))
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<usize> for Address
{
    fn from(value: usize) -> Self
    {
        Address(value as u64)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for Address
{
    type Output = Address;

    fn sub(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}

/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

use crate::buffer::Buffer;
use crate::error::{Overflow, ParseError};
use crate::proto::{ADDRESS_LENGTH, ADDRESS_RESERVED_PREFIX};
use crate::utils::hex_str_to_u64;

/// A 40-bit ZeroTier node address, the low 40 bits of a u64.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Address(u64);

impl Address {
    pub const NIL: Address = Address(0);

    pub fn from_u64(v: u64) -> Self {
        Self(v & 0xffffffffff)
    }

    pub fn from_bytes(b: &[u8; ADDRESS_LENGTH]) -> Self {
        Self(
            (b[0] as u64).wrapping_shl(32)
                | (b[1] as u64).wrapping_shl(24)
                | (b[2] as u64).wrapping_shl(16)
                | (b[3] as u64).wrapping_shl(8)
                | (b[4] as u64),
        )
    }

    pub fn to_u64(self) -> u64 {
        self.0
    }

    pub fn to_bytes(self) -> [u8; ADDRESS_LENGTH] {
        [
            (self.0 >> 32) as u8,
            (self.0 >> 24) as u8,
            (self.0 >> 16) as u8,
            (self.0 >> 8) as u8,
            self.0 as u8,
        ]
    }

    /// True for the zero address, which terminates chains and means "none".
    pub fn is_nil(self) -> bool {
        self.0 == 0
    }

    /// Addresses beginning with 0xff or equal to zero are reserved and
    /// never assigned to nodes.
    pub fn is_reserved(self) -> bool {
        self.0 == 0 || (self.0 >> 32) as u8 == ADDRESS_RESERVED_PREFIX
    }

    pub fn append_to<const C: usize>(self, b: &mut Buffer<C>) -> Result<(), Overflow> {
        b.append_bytes(&self.to_bytes())
    }

    pub fn read_from<const C: usize>(b: &Buffer<C>, at: usize) -> Result<Self, ParseError> {
        Ok(Self::from_bytes(b.field(at, ADDRESS_LENGTH)?.try_into().unwrap()))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:010x}", self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseError::MalformedField);
        }
        Ok(Self::from_u64(hex_str_to_u64(s)))
    }
}

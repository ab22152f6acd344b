/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

use crate::error::{Overflow, ParseError};

/// A bounded append-only byte blob with checked big-endian reads at
/// arbitrary (possibly unaligned) offsets.
///
/// The capacity bound C is compile time, matching the largest legal size
/// of whatever protocol object the buffer is used to marshal. Storage is
/// heap backed since the larger bounds run to hundreds of kilobytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Buffer<const C: usize> {
    b: Vec<u8>,
}

impl<const C: usize> Buffer<C> {
    pub fn new() -> Self {
        Self { b: Vec::new() }
    }

    /// Wrap received bytes for reading. Fails if larger than C.
    pub fn from_bytes(data: &[u8]) -> Result<Self, Overflow> {
        if data.len() > C {
            return Err(Overflow);
        }
        Ok(Self { b: data.to_vec() })
    }

    pub fn size(&self) -> usize {
        self.b.len()
    }

    pub fn is_empty(&self) -> bool {
        self.b.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.b
    }

    pub fn clear(&mut self) {
        self.b.clear();
    }

    pub fn append_bytes(&mut self, data: &[u8]) -> Result<(), Overflow> {
        if self.b.len() + data.len() > C {
            return Err(Overflow);
        }
        self.b.extend_from_slice(data);
        Ok(())
    }

    pub fn append_u8(&mut self, v: u8) -> Result<(), Overflow> {
        self.append_bytes(&[v])
    }

    pub fn append_u16(&mut self, v: u16) -> Result<(), Overflow> {
        self.append_bytes(&v.to_be_bytes())
    }

    pub fn append_u32(&mut self, v: u32) -> Result<(), Overflow> {
        self.append_bytes(&v.to_be_bytes())
    }

    pub fn append_u64(&mut self, v: u64) -> Result<(), Overflow> {
        self.append_bytes(&v.to_be_bytes())
    }

    /// Borrow `len` bytes at `at`, checking bounds.
    pub fn field(&self, at: usize, len: usize) -> Result<&[u8], ParseError> {
        self.b.get(at..at + len).ok_or(ParseError::Truncated)
    }

    pub fn u8_at(&self, at: usize) -> Result<u8, ParseError> {
        self.b.get(at).copied().ok_or(ParseError::Truncated)
    }

    pub fn u16_at(&self, at: usize) -> Result<u16, ParseError> {
        Ok(u16::from_be_bytes(self.field(at, 2)?.try_into().unwrap()))
    }

    pub fn u32_at(&self, at: usize) -> Result<u32, ParseError> {
        Ok(u32::from_be_bytes(self.field(at, 4)?.try_into().unwrap()))
    }

    pub fn u64_at(&self, at: usize) -> Result<u64, ParseError> {
        Ok(u64::from_be_bytes(self.field(at, 8)?.try_into().unwrap()))
    }
}

impl<const C: usize> Default for Buffer<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const C: usize> AsRef<[u8]> for Buffer<C> {
    fn as_ref(&self) -> &[u8] {
        &self.b
    }
}

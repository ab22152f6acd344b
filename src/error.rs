/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

/// A bounded container ran out of space during an append.
///
/// Capacities are compile-time constants sized for the largest legal
/// protocol objects, so in practice this only occurs when a caller tries
/// to serialize something that could never be sent anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overflow;

/// A type of fault that occurred while deserializing a received object.
///
/// A remote peer can intentionally trigger any of these, so they abort the
/// current parse and leave no partial state behind. They are never fatal
/// to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// A read ran past the end of the buffer, or a declared length did.
    Truncated,

    /// A count or length field exceeded a hard protocol cap.
    LengthOverflow,

    /// A signature block carried a marker byte this version does not
    /// recognize and no skippable length.
    UnknownSignatureMarker,

    /// A serialized object's version byte is not one this codec reads.
    UnsupportedVersion,

    /// A field's content was malformed (bad address, bad text encoding,
    /// unterminated chain, and similar).
    MalformedField,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Truncated => f.write_str("object truncated"),
            ParseError::LengthOverflow => f.write_str("length field exceeds protocol cap"),
            ParseError::UnknownSignatureMarker => f.write_str("unknown signature type marker"),
            ParseError::UnsupportedVersion => f.write_str("unsupported object version"),
            ParseError::MalformedField => f.write_str("malformed field"),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<Overflow> for ParseError {
    fn from(_: Overflow) -> Self {
        ParseError::LengthOverflow
    }
}

/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

use arrayvec::ArrayVec;

use crate::address::Address;
use crate::applicationlayer::ApplicationLayer;
use crate::buffer::Buffer;
use crate::credential::{controller_for, Credential, VerifyResult};
use crate::crypto::Identity;
use crate::error::{Overflow, ParseError};
use crate::proto::{ADDRESS_LENGTH, MAX_COM_QUALIFIERS, SIGNATURE_LENGTH};
use crate::utils::{hex, hex_str_to_u64, hex_to_bytes};

/// Reserved qualifier IDs. IDs below 65536 are reserved for use as
/// standard fields; everything else is available for rule matching.
pub const COM_RESERVED_ID_TIMESTAMP: u64 = 0;
pub const COM_RESERVED_ID_NETWORK_ID: u64 = 1;
pub const COM_RESERVED_ID_ISSUED_TO: u64 = 2;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Qualifier {
    id: u64,
    value: u64,
    max_delta: u64,
}

/// Certificate of network membership.
///
/// A certificate is a list of (id, value, maxDelta) qualifier tuples,
/// sorted by id. Two members agree with each other if, for every qualifier
/// one of them publishes, the other's value for the same id is within the
/// first's maxDelta. The timestamp qualifier makes certificates expire:
/// its maxDelta is the permitted clock divergence between members that are
/// still allowed to talk.
///
/// Certificates are signed by the network controller and presented to
/// prove membership on private networks.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CertificateOfMembership {
    qualifiers: ArrayVec<Qualifier, MAX_COM_QUALIFIERS>,
    signed_by: Address,
    signature: [u8; SIGNATURE_LENGTH],
}

impl CertificateOfMembership {
    /// An empty (nil) certificate.
    pub fn nil() -> Self {
        Self {
            qualifiers: ArrayVec::new(),
            signed_by: Address::NIL,
            signature: [0; SIGNATURE_LENGTH],
        }
    }

    /// Create a certificate with the three standard qualifiers.
    pub fn new(timestamp: u64, timestamp_max_delta: u64, network_id: u64, issued_to: Address) -> Self {
        let mut qualifiers = ArrayVec::new();
        qualifiers.push(Qualifier {
            id: COM_RESERVED_ID_TIMESTAMP,
            value: timestamp,
            max_delta: timestamp_max_delta,
        });
        qualifiers.push(Qualifier {
            id: COM_RESERVED_ID_NETWORK_ID,
            value: network_id,
            max_delta: 0,
        });
        qualifiers.push(Qualifier {
            id: COM_RESERVED_ID_ISSUED_TO,
            value: issued_to.to_u64(),
            max_delta: u64::MAX,
        });
        Self {
            qualifiers,
            signed_by: Address::NIL,
            signature: [0; SIGNATURE_LENGTH],
        }
    }

    pub fn is_nil(&self) -> bool {
        self.qualifiers.is_empty()
    }

    fn qualifier(&self, id: u64) -> u64 {
        self.qualifiers.iter().find(|q| q.id == id).map(|q| q.value).unwrap_or(0)
    }

    pub fn issued_to(&self) -> Address {
        Address::from_u64(self.qualifier(COM_RESERVED_ID_ISSUED_TO))
    }

    /// Set or alter a qualifier, keeping the list sorted by id. Signing
    /// must happen after all qualifiers are set. Returns false if full.
    pub fn set_qualifier(&mut self, id: u64, value: u64, max_delta: u64) -> bool {
        if let Some(q) = self.qualifiers.iter_mut().find(|q| q.id == id) {
            q.value = value;
            q.max_delta = max_delta;
            return true;
        }
        if self.qualifiers.is_full() {
            return false;
        }
        self.qualifiers.push(Qualifier { id, value, max_delta });
        self.qualifiers.sort_unstable_by_key(|q| q.id);
        true
    }

    /// Compare two certificates for parameter agreement.
    ///
    /// For each qualifier in this certificate, the other must have a
    /// qualifier with the same id whose value differs from ours by no more
    /// than our maxDelta for that id. Qualifiers the other publishes and
    /// we do not are ignored; qualifiers we publish and the other lacks
    /// fail the comparison. Empty certificates never agree.
    pub fn agrees_with(&self, other: &CertificateOfMembership) -> bool {
        if self.qualifiers.is_empty() || other.qualifiers.is_empty() {
            return false;
        }
        let mut otheridx = 0;
        for mine in self.qualifiers.iter() {
            // Seek to the corresponding tuple in other. This works because
            // qualifiers are sorted by id.
            loop {
                if otheridx >= other.qualifiers.len() {
                    return false;
                }
                if other.qualifiers[otheridx].id == mine.id {
                    break;
                }
                otheridx += 1;
            }
            let a = mine.value;
            let b = other.qualifiers[otheridx].value;
            if a.abs_diff(b) > mine.max_delta {
                return false;
            }
        }
        true
    }

    /// The packed qualifier tuples, which are the bytes that get signed.
    fn qualifier_bytes(&self) -> Vec<u8> {
        let mut b = Vec::with_capacity(self.qualifiers.len() * 24);
        for q in self.qualifiers.iter() {
            b.extend_from_slice(&q.id.to_be_bytes());
            b.extend_from_slice(&q.value.to_be_bytes());
            b.extend_from_slice(&q.max_delta.to_be_bytes());
        }
        b
    }

    /// Sign this certificate. Returns false if the signer has no private key.
    pub fn sign<I: Identity>(&mut self, signer: &I) -> bool {
        match signer.sign(&self.qualifier_bytes()) {
            Some(sig) => {
                self.signature = sig;
                self.signed_by = signer.address();
                true
            }
            None => false,
        }
    }

    /// Returns (certificate, bytes consumed).
    pub fn deserialize_from<const C: usize>(b: &Buffer<C>, start_at: usize) -> Result<(Self, usize), ParseError> {
        let mut p = start_at;

        if b.u8_at(p)? != 1 {
            return Err(ParseError::UnsupportedVersion);
        }
        p += 1;
        let qualifier_count = b.u16_at(p)? as usize;
        p += 2;
        if qualifier_count > MAX_COM_QUALIFIERS {
            return Err(ParseError::LengthOverflow);
        }
        let mut qualifiers = ArrayVec::new();
        for _ in 0..qualifier_count {
            let id = b.u64_at(p)?;
            let value = b.u64_at(p + 8)?;
            let max_delta = b.u64_at(p + 16)?;
            p += 24;
            qualifiers.push(Qualifier { id, value, max_delta });
        }

        let signed_by = Address::read_from(b, p)?;
        p += ADDRESS_LENGTH;
        let mut signature = [0u8; SIGNATURE_LENGTH];
        if !signed_by.is_nil() {
            signature.copy_from_slice(b.field(p, SIGNATURE_LENGTH)?);
            p += SIGNATURE_LENGTH;
        }

        Ok((
            Self {
                qualifiers,
                signed_by,
                signature,
            },
            p - start_at,
        ))
    }

    /// Textual form for the legacy `com` dictionary key:
    /// `1:<hex qualifiers>:<signedBy>[:<hex signature>]`.
    pub fn to_string_legacy(&self) -> String {
        let mut s = String::from("1:");
        s.push_str(&hex(&self.qualifier_bytes()));
        s.push(':');
        s.push_str(&self.signed_by.to_string());
        if !self.signed_by.is_nil() {
            s.push(':');
            s.push_str(&hex(&self.signature));
        }
        s
    }

    /// Parse the legacy textual form. Returns None on any malformation.
    pub fn from_string_legacy(s: &str) -> Option<Self> {
        let mut fields = s.split(':');
        if fields.next()? != "1" {
            return None;
        }
        let qbytes = hex_to_bytes(fields.next()?)?;
        if qbytes.len() % 24 != 0 || qbytes.len() / 24 > MAX_COM_QUALIFIERS {
            return None;
        }
        let mut qualifiers = ArrayVec::new();
        for q in qbytes.chunks_exact(24) {
            qualifiers.push(Qualifier {
                id: u64::from_be_bytes(q[0..8].try_into().unwrap()),
                value: u64::from_be_bytes(q[8..16].try_into().unwrap()),
                max_delta: u64::from_be_bytes(q[16..24].try_into().unwrap()),
            });
        }
        let signed_by = Address::from_u64(hex_str_to_u64(fields.next()?));
        let mut signature = [0u8; SIGNATURE_LENGTH];
        if !signed_by.is_nil() {
            let sig = hex_to_bytes(fields.next()?)?;
            if sig.len() != SIGNATURE_LENGTH {
                return None;
            }
            signature.copy_from_slice(&sig);
        }
        Some(Self {
            qualifiers,
            signed_by,
            signature,
        })
    }
}

impl Credential for CertificateOfMembership {
    fn network_id(&self) -> u64 {
        self.qualifier(COM_RESERVED_ID_NETWORK_ID)
    }

    fn timestamp(&self) -> u64 {
        self.qualifier(COM_RESERVED_ID_TIMESTAMP)
    }

    fn signed_by(&self) -> Address {
        self.signed_by
    }

    fn serialize_into<const C: usize>(&self, b: &mut Buffer<C>, for_sign: bool) -> Result<(), Overflow> {
        if for_sign {
            // Membership certificates predate the sentinel framing; the
            // signed bytes are the packed qualifier tuples alone.
            return b.append_bytes(&self.qualifier_bytes());
        }
        b.append_u8(1)?;
        b.append_u16(self.qualifiers.len() as u16)?;
        b.append_bytes(&self.qualifier_bytes())?;
        self.signed_by.append_to(b)?;
        if !self.signed_by.is_nil() {
            b.append_bytes(&self.signature)?;
        }
        Ok(())
    }

    fn verify<App: ApplicationLayer>(&self, app: &App) -> VerifyResult {
        if self.signed_by.is_nil() || self.signed_by != controller_for(self.network_id()) {
            return VerifyResult::Bad;
        }
        let id = match app.get_identity(self.signed_by) {
            Some(id) => id,
            None => {
                app.request_whois(self.signed_by);
                return VerifyResult::WaitingForIdentity;
            }
        };
        if id.verify(&self.qualifier_bytes(), &self.signature) {
            VerifyResult::Ok
        } else {
            VerifyResult::Bad
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreement_tolerance() {
        let nwid = 0x8056c2e21c000001;
        let a = CertificateOfMembership::new(10_000, 1000, nwid, Address::from_u64(0x1111111111));
        let close = CertificateOfMembership::new(10_900, 1000, nwid, Address::from_u64(0x2222222222));
        let far = CertificateOfMembership::new(12_000, 1000, nwid, Address::from_u64(0x3333333333));
        let other_net = CertificateOfMembership::new(10_000, 1000, nwid + (1 << 24), Address::from_u64(0x2222222222));
        assert!(a.agrees_with(&close));
        assert!(close.agrees_with(&a));
        assert!(!a.agrees_with(&far));
        assert!(!a.agrees_with(&other_net));
        assert!(!a.agrees_with(&CertificateOfMembership::nil()));
    }

    #[test]
    fn missing_qualifier_fails() {
        let nwid = 1 << 24;
        let mut a = CertificateOfMembership::new(0, 1000, nwid, Address::from_u64(1));
        let b = CertificateOfMembership::new(0, 1000, nwid, Address::from_u64(2));
        assert!(a.set_qualifier(70000, 5, 0));
        // We publish qualifier 70000, the other does not.
        assert!(!a.agrees_with(&b));
        // The other direction ignores qualifiers it does not publish.
        assert!(b.agrees_with(&a));
    }

    #[test]
    fn wire_round_trip() {
        let mut com = CertificateOfMembership::new(12345, 1000, 0x8056c2e21c000001, Address::from_u64(0x89e92ceee5));
        com.signed_by = controller_for(0x8056c2e21c000001);
        com.signature = [9; SIGNATURE_LENGTH];
        let mut b = Buffer::<4096>::new();
        com.serialize_into(&mut b, false).unwrap();
        let (com2, consumed) = CertificateOfMembership::deserialize_from(&b, 0).unwrap();
        assert_eq!(consumed, b.size());
        assert_eq!(com, com2);
    }

    #[test]
    fn legacy_string_round_trip() {
        let mut com = CertificateOfMembership::new(7, 3, 0x8056c2e21c000001, Address::from_u64(0x89e92ceee5));
        com.signed_by = controller_for(0x8056c2e21c000001);
        com.signature = [0xab; SIGNATURE_LENGTH];
        let s = com.to_string_legacy();
        assert_eq!(CertificateOfMembership::from_string_legacy(&s).unwrap(), com);
        assert!(CertificateOfMembership::from_string_legacy("2:00:0").is_none());
    }
}

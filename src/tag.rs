/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

use crate::address::Address;
use crate::applicationlayer::ApplicationLayer;
use crate::buffer::Buffer;
use crate::credential::{controller_for, signing_bytes, Credential, VerifyResult};
use crate::crypto::Identity;
use crate::error::{Overflow, ParseError};
use crate::proto::{ADDRESS_LENGTH, CREDENTIAL_SIGNING_SENTINEL, SIGNATURE_LENGTH};

/// A tag that can be associated with members and matched in rules.
///
/// Capabilities group rules, while tags group members subject to those
/// rules. Tag values can be matched in rules, and tags relevant to a
/// capability are presented along with it.
///
/// E.g. a capability might be "can speak Samba/CIFS within your
/// department." This cap might have a rule to allow TCP/137 but only if a
/// given tag ID's value matches between two peers. The capability is what
/// members can do, while the tag is who they are. Different departments
/// might have tags with the same ID but different values.
///
/// Unlike capabilities tags are signed only by the issuer and are never
/// transferrable.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Tag {
    network_id: u64,
    ts: u64,
    id: u32,
    value: u32,
    issued_to: Address,
    signed_by: Address,
    signature: [u8; SIGNATURE_LENGTH],
}

impl Tag {
    pub fn new(network_id: u64, ts: u64, issued_to: Address, id: u32, value: u32) -> Self {
        Self {
            network_id,
            ts,
            id,
            value,
            issued_to,
            signed_by: Address::NIL,
            signature: [0; SIGNATURE_LENGTH],
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn issued_to(&self) -> Address {
        self.issued_to
    }

    /// Sign this tag. Returns false if the signer has no private key.
    pub fn sign<I: Identity>(&mut self, signer: &I) -> bool {
        self.signed_by = signer.address();
        if let Some(tmp) = signing_bytes(self) {
            if let Some(sig) = signer.sign(tmp.data()) {
                self.signature = sig;
                return true;
            }
        }
        self.signed_by = Address::NIL;
        false
    }

    /// Returns (tag, bytes consumed).
    pub fn deserialize_from<const C: usize>(b: &Buffer<C>, start_at: usize) -> Result<(Self, usize), ParseError> {
        let mut p = start_at;

        let network_id = b.u64_at(p)?;
        p += 8;
        let ts = b.u64_at(p)?;
        p += 8;
        let id = b.u32_at(p)?;
        p += 4;
        let value = b.u32_at(p)?;
        p += 4;
        let issued_to = Address::read_from(b, p)?;
        p += ADDRESS_LENGTH;
        let signed_by = Address::read_from(b, p)?;
        p += ADDRESS_LENGTH;

        let mut signature = [0u8; SIGNATURE_LENGTH];
        if b.u8_at(p)? == 1 {
            p += 1;
            if b.u16_at(p)? as usize != SIGNATURE_LENGTH {
                return Err(ParseError::UnknownSignatureMarker);
            }
            p += 2;
            signature.copy_from_slice(b.field(p, SIGNATURE_LENGTH)?);
            p += SIGNATURE_LENGTH;
        } else {
            p += 1;
            p += 2 + b.u16_at(p)? as usize;
        }

        p += 2 + b.u16_at(p)? as usize;
        if p > b.size() {
            return Err(ParseError::Truncated);
        }

        Ok((
            Self {
                network_id,
                ts,
                id,
                value,
                issued_to,
                signed_by,
                signature,
            },
            p - start_at,
        ))
    }
}

impl Credential for Tag {
    fn network_id(&self) -> u64 {
        self.network_id
    }

    fn timestamp(&self) -> u64 {
        self.ts
    }

    fn signed_by(&self) -> Address {
        self.signed_by
    }

    fn serialize_into<const C: usize>(&self, b: &mut Buffer<C>, for_sign: bool) -> Result<(), Overflow> {
        if for_sign {
            b.append_u64(CREDENTIAL_SIGNING_SENTINEL)?;
        }

        // These are the same between Tag and Capability.
        b.append_u64(self.network_id)?;
        b.append_u64(self.ts)?;
        b.append_u32(self.id)?;

        b.append_u32(self.value)?;

        self.issued_to.append_to(b)?;
        self.signed_by.append_to(b)?;
        if !for_sign {
            b.append_u8(1)?; // 1 == Ed25519
            b.append_u16(SIGNATURE_LENGTH as u16)?;
            b.append_bytes(&self.signature)?;
        }

        b.append_u16(0)?; // length of additional fields, currently 0

        if for_sign {
            b.append_u64(CREDENTIAL_SIGNING_SENTINEL)?;
        }
        Ok(())
    }

    fn verify<App: ApplicationLayer>(&self, app: &App) -> VerifyResult {
        if self.signed_by.is_nil() || self.signed_by != controller_for(self.network_id) {
            return VerifyResult::Bad;
        }
        let id = match app.get_identity(self.signed_by) {
            Some(id) => id,
            None => {
                app.request_whois(self.signed_by);
                return VerifyResult::WaitingForIdentity;
            }
        };
        match signing_bytes(self) {
            Some(tmp) if id.verify(tmp.data(), &self.signature) => VerifyResult::Ok,
            _ => VerifyResult::Bad,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip() {
        let mut t = Tag::new(0x8056c2e21c000001, 12345, Address::from_u64(0x89e92ceee5), 100, 7);
        t.signed_by = controller_for(t.network_id);
        t.signature = [0x5a; SIGNATURE_LENGTH];

        let mut b = Buffer::<1024>::new();
        t.serialize_into(&mut b, false).unwrap();
        let (t2, consumed) = Tag::deserialize_from(&b, 0).unwrap();
        assert_eq!(consumed, b.size());
        assert_eq!(t, t2);
    }

    #[test]
    fn truncated_fails() {
        let t = Tag::new(1 << 24, 0, Address::from_u64(2), 1, 1);
        let mut b = Buffer::<1024>::new();
        t.serialize_into(&mut b, false).unwrap();
        let cut = Buffer::<1024>::from_bytes(&b.data()[..b.size() - 3]).unwrap();
        assert!(Tag::deserialize_from(&cut, 0).is_err());
    }
}

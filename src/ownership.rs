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
use crate::credential::{controller_for, signing_bytes, Credential, VerifyResult};
use crate::crypto::Identity;
use crate::error::{Overflow, ParseError};
use crate::inetaddress::InetAddress;
use crate::proto::{ADDRESS_LENGTH, COO_THING_VALUE_SIZE, CREDENTIAL_SIGNING_SENTINEL, MAX_COO_THINGS, SIGNATURE_LENGTH};

/// The type of a thing a member can own.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Thing {
    Null = 0,
    MacAddress = 1,
    Ipv4Address = 2,
    Ipv6Address = 3,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct OwnedThing {
    thing_type: u8,
    value: [u8; COO_THING_VALUE_SIZE],
}

/// A signed assertion that a specific network member owns a list of
/// things: MAC addresses, IPv4 addresses, or IPv6 addresses. Used to stop
/// spoofing of assigned addresses on a network.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CertificateOfOwnership {
    network_id: u64,
    ts: u64,
    flags: u64,
    id: u32,
    things: ArrayVec<OwnedThing, MAX_COO_THINGS>,
    issued_to: Address,
    signed_by: Address,
    signature: [u8; SIGNATURE_LENGTH],
}

impl CertificateOfOwnership {
    pub fn new(network_id: u64, ts: u64, issued_to: Address, id: u32) -> Self {
        Self {
            network_id,
            ts,
            flags: 0,
            id,
            things: ArrayVec::new(),
            issued_to,
            signed_by: Address::NIL,
            signature: [0; SIGNATURE_LENGTH],
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn issued_to(&self) -> Address {
        self.issued_to
    }

    pub fn thing_count(&self) -> usize {
        self.things.len()
    }

    fn add_thing(&mut self, thing_type: Thing, bytes: &[u8]) -> bool {
        if self.things.is_full() || bytes.len() > COO_THING_VALUE_SIZE {
            return false;
        }
        let mut value = [0u8; COO_THING_VALUE_SIZE];
        value[..bytes.len()].copy_from_slice(bytes);
        self.things.push(OwnedThing {
            thing_type: thing_type as u8,
            value,
        });
        true
    }

    /// Add an IP address to this certificate. Returns false if full or nil.
    pub fn add_thing_ip(&mut self, ip: &InetAddress) -> bool {
        match ip {
            InetAddress::V4 { ip, .. } => self.add_thing(Thing::Ipv4Address, ip),
            InetAddress::V6 { ip, .. } => self.add_thing(Thing::Ipv6Address, ip),
            InetAddress::Nil => false,
        }
    }

    /// Add an Ethernet MAC address to this certificate.
    pub fn add_thing_mac(&mut self, mac: &[u8; 6]) -> bool {
        self.add_thing(Thing::MacAddress, mac)
    }

    /// True if this certificate asserts ownership of the given thing. The
    /// value is compared for its full declared length; first match wins.
    pub fn owns(&self, thing_type: Thing, value: &[u8]) -> bool {
        if value.len() > COO_THING_VALUE_SIZE {
            return false;
        }
        self.things
            .iter()
            .any(|t| t.thing_type == thing_type as u8 && t.value[..value.len()] == *value)
    }

    /// True if this certificate asserts ownership of the given IP.
    pub fn owns_ip(&self, ip: &InetAddress) -> bool {
        match ip {
            InetAddress::V4 { ip, .. } => self.owns(Thing::Ipv4Address, ip),
            InetAddress::V6 { ip, .. } => self.owns(Thing::Ipv6Address, ip),
            InetAddress::Nil => false,
        }
    }

    /// Sign this certificate. Returns false if the signer has no private key.
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

    /// Returns (certificate, bytes consumed).
    pub fn deserialize_from<const C: usize>(b: &Buffer<C>, start_at: usize) -> Result<(Self, usize), ParseError> {
        let mut p = start_at;

        let network_id = b.u64_at(p)?;
        p += 8;
        let ts = b.u64_at(p)?;
        p += 8;
        let flags = b.u64_at(p)?;
        p += 8;
        let id = b.u32_at(p)?;
        p += 4;

        let thing_count = b.u16_at(p)? as usize;
        p += 2;
        if thing_count > MAX_COO_THINGS {
            return Err(ParseError::LengthOverflow);
        }
        let mut things = ArrayVec::new();
        for _ in 0..thing_count {
            let thing_type = b.u8_at(p)?;
            p += 1;
            let value: [u8; COO_THING_VALUE_SIZE] = b.field(p, COO_THING_VALUE_SIZE)?.try_into().unwrap();
            p += COO_THING_VALUE_SIZE;
            things.push(OwnedThing { thing_type, value });
        }

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
                flags,
                id,
                things,
                issued_to,
                signed_by,
                signature,
            },
            p - start_at,
        ))
    }
}

impl Credential for CertificateOfOwnership {
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

        b.append_u64(self.network_id)?;
        b.append_u64(self.ts)?;
        b.append_u64(self.flags)?;
        b.append_u32(self.id)?;

        b.append_u16(self.things.len() as u16)?;
        for t in self.things.iter() {
            b.append_u8(t.thing_type)?;
            b.append_bytes(&t.value)?;
        }

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

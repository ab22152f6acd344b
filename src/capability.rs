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
use crate::proto::{ADDRESS_LENGTH, CREDENTIAL_SIGNING_SENTINEL, MAX_CAPABILITY_CUSTODY_CHAIN_LENGTH, MAX_CAPABILITY_RULES, SIGNATURE_LENGTH};
use crate::rules::{deserialize_rules, serialize_rules, Rule};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct CustodyLink {
    to: Address,
    from: Address,
    signature: [u8; SIGNATURE_LENGTH],
}

/// A set of grouped and signed network flow rules.
///
/// On private networks a capability is issued to a member to grant it
/// abilities beyond the network's base rules. The capability's own rule
/// set is evaluated before the base rules, and an ACTION_BREAK falls
/// through to them.
///
/// Unlike tags, capabilities can be transferred between members subject to
/// a chain of custody: each link is a signature over the capability's
/// invariant body by the previous holder, starting with the network
/// controller. The maximum chain length bounds how many times the
/// capability may change hands.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Capability {
    network_id: u64,
    ts: u64,
    id: u32,
    max_custody_chain_length: u8,
    rules: ArrayVec<Rule, MAX_CAPABILITY_RULES>,
    custody: ArrayVec<CustodyLink, MAX_CAPABILITY_CUSTODY_CHAIN_LENGTH>,
}

impl Capability {
    /// Create an unsigned capability. Rules beyond the cap are dropped and
    /// the chain length is clamped to its legal range.
    pub fn new(network_id: u64, ts: u64, id: u32, max_custody_chain_length: u8, rules: &[Rule]) -> Self {
        Self {
            network_id,
            ts,
            id,
            max_custody_chain_length: max_custody_chain_length.clamp(1, MAX_CAPABILITY_CUSTODY_CHAIN_LENGTH as u8),
            rules: rules.iter().copied().take(MAX_CAPABILITY_RULES).collect(),
            custody: ArrayVec::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The member this capability currently belongs to: the `to` of the
    /// last custody link, or nil if unsigned.
    pub fn issued_to(&self) -> Address {
        self.custody.last().map(|l| l.to).unwrap_or(Address::NIL)
    }

    /// Sign the next link in the chain of custody, transferring the
    /// capability to `to`. The first signature must be the controller's.
    /// Returns false if the chain is full or the signer cannot sign.
    pub fn sign<I: Identity>(&mut self, from: &I, to: Address) -> bool {
        if self.custody.len() >= self.max_custody_chain_length as usize || self.custody.is_full() {
            return false;
        }
        let tmp = match signing_bytes(self) {
            Some(tmp) => tmp,
            None => return false,
        };
        match from.sign(tmp.data()) {
            Some(signature) => {
                self.custody.push(CustodyLink {
                    to,
                    from: from.address(),
                    signature,
                });
                true
            }
            None => false,
        }
    }

    /// Returns (capability, bytes consumed).
    pub fn deserialize_from<const C: usize>(b: &Buffer<C>, start_at: usize) -> Result<(Self, usize), ParseError> {
        let mut p = start_at;

        let network_id = b.u64_at(p)?;
        p += 8;
        let ts = b.u64_at(p)?;
        p += 8;
        let id = b.u32_at(p)?;
        p += 4;

        let rule_count = b.u16_at(p)? as usize;
        p += 2;
        if rule_count > MAX_CAPABILITY_RULES {
            return Err(ParseError::LengthOverflow);
        }
        let mut rules_tmp = Vec::with_capacity(rule_count);
        p += deserialize_rules(b, p, &mut rules_tmp, rule_count)?;
        let rules: ArrayVec<Rule, MAX_CAPABILITY_RULES> = rules_tmp.into_iter().collect();

        let max_custody_chain_length = b.u8_at(p)?;
        p += 1;
        if max_custody_chain_length < 1 || max_custody_chain_length as usize > MAX_CAPABILITY_CUSTODY_CHAIN_LENGTH {
            return Err(ParseError::MalformedField);
        }

        let mut custody = ArrayVec::new();
        loop {
            let to = Address::read_from(b, p)?;
            p += ADDRESS_LENGTH;
            if to.is_nil() {
                // A zero 'to' address terminates the chain.
                break;
            }
            if custody.len() >= max_custody_chain_length as usize || custody.is_full() {
                return Err(ParseError::MalformedField);
            }
            let from = Address::read_from(b, p)?;
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
            custody.push(CustodyLink { to, from, signature });
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
                max_custody_chain_length,
                rules,
                custody,
            },
            p - start_at,
        ))
    }
}

impl Credential for Capability {
    fn network_id(&self) -> u64 {
        self.network_id
    }

    fn timestamp(&self) -> u64 {
        self.ts
    }

    /// The issuer: the `from` of the first custody link.
    fn signed_by(&self) -> Address {
        self.custody.first().map(|l| l.from).unwrap_or(Address::NIL)
    }

    fn serialize_into<const C: usize>(&self, b: &mut Buffer<C>, for_sign: bool) -> Result<(), Overflow> {
        if for_sign {
            b.append_u64(CREDENTIAL_SIGNING_SENTINEL)?;
        }

        // These are the same between Tag and Capability.
        b.append_u64(self.network_id)?;
        b.append_u64(self.ts)?;
        b.append_u32(self.id)?;

        b.append_u16(self.rules.len() as u16)?;
        serialize_rules(b, &self.rules)?;
        b.append_u8(self.max_custody_chain_length)?;

        if !for_sign {
            for link in self.custody.iter() {
                link.to.append_to(b)?;
                link.from.append_to(b)?;
                b.append_u8(1)?; // 1 == Ed25519
                b.append_u16(SIGNATURE_LENGTH as u16)?;
                b.append_bytes(&link.signature)?;
            }
            // A zero 'to' address terminates the chain.
            b.append_bytes(&[0u8; ADDRESS_LENGTH])?;
        }

        b.append_u16(0)?; // length of additional fields, currently 0

        if for_sign {
            b.append_u64(CREDENTIAL_SIGNING_SENTINEL)?;
        }
        Ok(())
    }

    fn verify<App: ApplicationLayer>(&self, app: &App) -> VerifyResult {
        if self.max_custody_chain_length < 1 || self.max_custody_chain_length as usize > MAX_CAPABILITY_CUSTODY_CHAIN_LENGTH {
            return VerifyResult::Bad;
        }
        let tmp = match signing_bytes(self) {
            Some(tmp) => tmp,
            None => return VerifyResult::Bad,
        };

        for c in 0..self.max_custody_chain_length as usize {
            let link = self.custody.get(c);
            if c == 0 {
                // The first link must be present and from the network's controller.
                match link {
                    Some(l) if !l.to.is_nil() && l.from == controller_for(self.network_id) => {}
                    _ => return VerifyResult::Bad,
                }
            } else {
                match link {
                    // All previous links were valid, so we are valid.
                    None => return VerifyResult::Ok,
                    // Any further link must be from the previous holder.
                    Some(l) => {
                        if l.from.is_nil() || l.from != self.custody[c - 1].to {
                            return VerifyResult::Bad;
                        }
                    }
                }
            }
            let link = link.unwrap();
            match app.get_identity(link.from) {
                Some(id) => {
                    if !id.verify(tmp.data(), &link.signature) {
                        return VerifyResult::Bad;
                    }
                }
                None => {
                    app.request_whois(link.from);
                    return VerifyResult::WaitingForIdentity;
                }
            }
        }

        // We reached the maximum chain length and every link was valid.
        VerifyResult::Ok
    }
}

/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

use crate::address::Address;
use crate::buffer::Buffer;
use crate::error::{Overflow, ParseError};

// Raw rule type values as they appear in the low 6 bits of a rule's type
// byte. Types below the match range are actions.
pub const RULE_ACTION_DROP: u8 = 0;
pub const RULE_ACTION_ACCEPT: u8 = 1;
pub const RULE_ACTION_TEE: u8 = 2;
pub const RULE_ACTION_WATCH: u8 = 3;
pub const RULE_ACTION_REDIRECT: u8 = 4;
pub const RULE_ACTION_BREAK: u8 = 5;
pub const RULE_MATCH_SOURCE_ZEROTIER_ADDRESS: u8 = 24;
pub const RULE_MATCH_DEST_ZEROTIER_ADDRESS: u8 = 25;
pub const RULE_MATCH_VLAN_ID: u8 = 26;
pub const RULE_MATCH_VLAN_PCP: u8 = 27;
pub const RULE_MATCH_VLAN_DEI: u8 = 28;
pub const RULE_MATCH_MAC_SOURCE: u8 = 29;
pub const RULE_MATCH_MAC_DEST: u8 = 30;
pub const RULE_MATCH_IPV4_SOURCE: u8 = 31;
pub const RULE_MATCH_IPV4_DEST: u8 = 32;
pub const RULE_MATCH_IPV6_SOURCE: u8 = 33;
pub const RULE_MATCH_IPV6_DEST: u8 = 34;
pub const RULE_MATCH_IP_TOS: u8 = 35;
pub const RULE_MATCH_IP_PROTOCOL: u8 = 36;
pub const RULE_MATCH_ETHERTYPE: u8 = 37;
pub const RULE_MATCH_ICMP: u8 = 38;
pub const RULE_MATCH_IP_SOURCE_PORT_RANGE: u8 = 39;
pub const RULE_MATCH_IP_DEST_PORT_RANGE: u8 = 40;
pub const RULE_MATCH_CHARACTERISTICS: u8 = 41;
pub const RULE_MATCH_FRAME_SIZE_RANGE: u8 = 42;
pub const RULE_MATCH_TAGS_DIFFERENCE: u8 = 43;
pub const RULE_MATCH_TAGS_BITWISE_AND: u8 = 44;
pub const RULE_MATCH_TAGS_BITWISE_OR: u8 = 45;
pub const RULE_MATCH_TAGS_BITWISE_XOR: u8 = 46;
pub const RULE_MATCH_TAGS_EQUAL: u8 = 47;

const RULE_NOT_BIT: u8 = 0x80;
const RULE_OR_BIT: u8 = 0x40;

/// Sense qualifiers carried by every match entry: NOT inverts the match,
/// OR combines it with the previous match instead of AND.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct MatchSense {
    pub not: bool,
    pub or: bool,
}

impl MatchSense {
    fn from_type_byte(t: u8) -> Self {
        Self {
            not: (t & RULE_NOT_BIT) != 0,
            or: (t & RULE_OR_BIT) != 0,
        }
    }

    fn bits(&self) -> u8 {
        (if self.not { RULE_NOT_BIT } else { 0 }) | (if self.or { RULE_OR_BIT } else { 0 })
    }
}

/// One entry in a rules table.
///
/// A rules table is a sequence of zero or more matches followed by an
/// action; the action applies if the matches (ANDed/ORed per their sense
/// bits) pass. On the wire each entry is a type byte, an 8-bit field
/// length, and typed fields; the length lets unsupported entries be
/// skipped and carried without being understood.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Rule {
    ActionDrop,
    ActionAccept,
    /// Send a copy of matching frames to an observer, up to `length`
    /// bytes of each frame (0 for the whole frame).
    ActionTee { address: Address, flags: u32, length: u16 },
    /// Like tee but the observer must acknowledge receipt.
    ActionWatch { address: Address, flags: u32, length: u16 },
    /// Transparently divert matching frames to another member.
    ActionRedirect { address: Address, flags: u32, length: u16 },
    /// Stop evaluating this table (used inside capability rule sets).
    ActionBreak,
    MatchSourceZeroTierAddress { sense: MatchSense, address: Address },
    MatchDestZeroTierAddress { sense: MatchSense, address: Address },
    MatchVlanId { sense: MatchSense, vlan_id: u16 },
    MatchVlanPcp { sense: MatchSense, vlan_pcp: u8 },
    MatchVlanDei { sense: MatchSense, vlan_dei: u8 },
    MatchMacSource { sense: MatchSense, mac: [u8; 6] },
    MatchMacDest { sense: MatchSense, mac: [u8; 6] },
    MatchIpv4Source { sense: MatchSense, ip: [u8; 4], mask: u8 },
    MatchIpv4Dest { sense: MatchSense, ip: [u8; 4], mask: u8 },
    MatchIpv6Source { sense: MatchSense, ip: [u8; 16], mask: u8 },
    MatchIpv6Dest { sense: MatchSense, ip: [u8; 16], mask: u8 },
    MatchIpTos { sense: MatchSense, ip_tos: u8 },
    MatchIpProtocol { sense: MatchSense, ip_protocol: u8 },
    MatchEtherType { sense: MatchSense, ether_type: u16 },
    MatchIcmp { sense: MatchSense, icmp_type: u8, icmp_code: Option<u8> },
    MatchIpSourcePortRange { sense: MatchSense, start: u16, end: u16 },
    MatchIpDestPortRange { sense: MatchSense, start: u16, end: u16 },
    MatchCharacteristics { sense: MatchSense, characteristics: u64 },
    MatchFrameSizeRange { sense: MatchSense, start: u16, end: u16 },
    MatchTagsDifference { sense: MatchSense, id: u32, value: u32 },
    MatchTagsBitwiseAnd { sense: MatchSense, id: u32, value: u32 },
    MatchTagsBitwiseOr { sense: MatchSense, id: u32, value: u32 },
    MatchTagsBitwiseXor { sense: MatchSense, id: u32, value: u32 },
    MatchTagsEqual { sense: MatchSense, id: u32, value: u32 },
    /// A rule type this version does not understand. The type byte is
    /// preserved so tables re-serialize and the unsupported-match flag can
    /// be applied; field contents are dropped.
    Unrecognized { t: u8 },
}

impl Rule {
    /// The raw rule type (low 6 bits of the wire type byte).
    pub fn rule_type(&self) -> u8 {
        self.type_byte() & 0x3f
    }

    /// True for action entries, false for matches.
    pub fn is_action(&self) -> bool {
        self.rule_type() <= RULE_ACTION_BREAK && !matches!(self, Rule::Unrecognized { .. })
    }

    fn type_byte(&self) -> u8 {
        match self {
            Rule::ActionDrop => RULE_ACTION_DROP,
            Rule::ActionAccept => RULE_ACTION_ACCEPT,
            Rule::ActionTee { .. } => RULE_ACTION_TEE,
            Rule::ActionWatch { .. } => RULE_ACTION_WATCH,
            Rule::ActionRedirect { .. } => RULE_ACTION_REDIRECT,
            Rule::ActionBreak => RULE_ACTION_BREAK,
            Rule::MatchSourceZeroTierAddress { sense, .. } => RULE_MATCH_SOURCE_ZEROTIER_ADDRESS | sense.bits(),
            Rule::MatchDestZeroTierAddress { sense, .. } => RULE_MATCH_DEST_ZEROTIER_ADDRESS | sense.bits(),
            Rule::MatchVlanId { sense, .. } => RULE_MATCH_VLAN_ID | sense.bits(),
            Rule::MatchVlanPcp { sense, .. } => RULE_MATCH_VLAN_PCP | sense.bits(),
            Rule::MatchVlanDei { sense, .. } => RULE_MATCH_VLAN_DEI | sense.bits(),
            Rule::MatchMacSource { sense, .. } => RULE_MATCH_MAC_SOURCE | sense.bits(),
            Rule::MatchMacDest { sense, .. } => RULE_MATCH_MAC_DEST | sense.bits(),
            Rule::MatchIpv4Source { sense, .. } => RULE_MATCH_IPV4_SOURCE | sense.bits(),
            Rule::MatchIpv4Dest { sense, .. } => RULE_MATCH_IPV4_DEST | sense.bits(),
            Rule::MatchIpv6Source { sense, .. } => RULE_MATCH_IPV6_SOURCE | sense.bits(),
            Rule::MatchIpv6Dest { sense, .. } => RULE_MATCH_IPV6_DEST | sense.bits(),
            Rule::MatchIpTos { sense, .. } => RULE_MATCH_IP_TOS | sense.bits(),
            Rule::MatchIpProtocol { sense, .. } => RULE_MATCH_IP_PROTOCOL | sense.bits(),
            Rule::MatchEtherType { sense, .. } => RULE_MATCH_ETHERTYPE | sense.bits(),
            Rule::MatchIcmp { sense, .. } => RULE_MATCH_ICMP | sense.bits(),
            Rule::MatchIpSourcePortRange { sense, .. } => RULE_MATCH_IP_SOURCE_PORT_RANGE | sense.bits(),
            Rule::MatchIpDestPortRange { sense, .. } => RULE_MATCH_IP_DEST_PORT_RANGE | sense.bits(),
            Rule::MatchCharacteristics { sense, .. } => RULE_MATCH_CHARACTERISTICS | sense.bits(),
            Rule::MatchFrameSizeRange { sense, .. } => RULE_MATCH_FRAME_SIZE_RANGE | sense.bits(),
            Rule::MatchTagsDifference { sense, .. } => RULE_MATCH_TAGS_DIFFERENCE | sense.bits(),
            Rule::MatchTagsBitwiseAnd { sense, .. } => RULE_MATCH_TAGS_BITWISE_AND | sense.bits(),
            Rule::MatchTagsBitwiseOr { sense, .. } => RULE_MATCH_TAGS_BITWISE_OR | sense.bits(),
            Rule::MatchTagsBitwiseXor { sense, .. } => RULE_MATCH_TAGS_BITWISE_XOR | sense.bits(),
            Rule::MatchTagsEqual { sense, .. } => RULE_MATCH_TAGS_EQUAL | sense.bits(),
            Rule::Unrecognized { t } => *t,
        }
    }

    pub fn serialize_into<const C: usize>(&self, b: &mut Buffer<C>) -> Result<(), Overflow> {
        b.append_u8(self.type_byte())?;
        match self {
            Rule::ActionDrop | Rule::ActionAccept | Rule::ActionBreak | Rule::Unrecognized { .. } => b.append_u8(0),
            Rule::ActionTee { address, flags, length }
            | Rule::ActionWatch { address, flags, length }
            | Rule::ActionRedirect { address, flags, length } => {
                b.append_u8(14)?;
                b.append_u64(address.to_u64())?;
                b.append_u32(*flags)?;
                b.append_u16(*length)
            }
            Rule::MatchSourceZeroTierAddress { address, .. } | Rule::MatchDestZeroTierAddress { address, .. } => {
                b.append_u8(5)?;
                address.append_to(b)
            }
            Rule::MatchVlanId { vlan_id, .. } => {
                b.append_u8(2)?;
                b.append_u16(*vlan_id)
            }
            Rule::MatchVlanPcp { vlan_pcp, .. } => {
                b.append_u8(1)?;
                b.append_u8(*vlan_pcp)
            }
            Rule::MatchVlanDei { vlan_dei, .. } => {
                b.append_u8(1)?;
                b.append_u8(*vlan_dei)
            }
            Rule::MatchMacSource { mac, .. } | Rule::MatchMacDest { mac, .. } => {
                b.append_u8(6)?;
                b.append_bytes(mac)
            }
            Rule::MatchIpv4Source { ip, mask, .. } | Rule::MatchIpv4Dest { ip, mask, .. } => {
                b.append_u8(5)?;
                b.append_bytes(ip)?;
                b.append_u8(*mask)
            }
            Rule::MatchIpv6Source { ip, mask, .. } | Rule::MatchIpv6Dest { ip, mask, .. } => {
                b.append_u8(17)?;
                b.append_bytes(ip)?;
                b.append_u8(*mask)
            }
            Rule::MatchIpTos { ip_tos, .. } => {
                b.append_u8(1)?;
                b.append_u8(*ip_tos)
            }
            Rule::MatchIpProtocol { ip_protocol, .. } => {
                b.append_u8(1)?;
                b.append_u8(*ip_protocol)
            }
            Rule::MatchEtherType { ether_type, .. } => {
                b.append_u8(2)?;
                b.append_u16(*ether_type)
            }
            Rule::MatchIcmp { icmp_type, icmp_code, .. } => {
                b.append_u8(3)?;
                b.append_u8(*icmp_type)?;
                b.append_u8(icmp_code.unwrap_or(0))?;
                b.append_u8(if icmp_code.is_some() { 0x01 } else { 0 })
            }
            Rule::MatchIpSourcePortRange { start, end, .. }
            | Rule::MatchIpDestPortRange { start, end, .. }
            | Rule::MatchFrameSizeRange { start, end, .. } => {
                b.append_u8(4)?;
                b.append_u16(*start)?;
                b.append_u16(*end)
            }
            Rule::MatchCharacteristics { characteristics, .. } => {
                b.append_u8(8)?;
                b.append_u64(*characteristics)
            }
            Rule::MatchTagsDifference { id, value, .. }
            | Rule::MatchTagsBitwiseAnd { id, value, .. }
            | Rule::MatchTagsBitwiseOr { id, value, .. }
            | Rule::MatchTagsBitwiseXor { id, value, .. }
            | Rule::MatchTagsEqual { id, value, .. } => {
                b.append_u8(8)?;
                b.append_u32(*id)?;
                b.append_u32(*value)
            }
        }
    }

    /// Returns (rule, bytes consumed). The declared field length governs
    /// how far the cursor advances so unknown types pass through cleanly.
    pub fn deserialize_from<const C: usize>(b: &Buffer<C>, start_at: usize) -> Result<(Self, usize), ParseError> {
        let mut p = start_at;
        let t = b.u8_at(p)?;
        p += 1;
        let field_len = b.u8_at(p)? as usize;
        p += 1;
        let sense = MatchSense::from_type_byte(t);

        let rule = match t & 0x3f {
            RULE_ACTION_DROP => Rule::ActionDrop,
            RULE_ACTION_ACCEPT => Rule::ActionAccept,
            RULE_ACTION_BREAK => Rule::ActionBreak,
            RULE_ACTION_TEE | RULE_ACTION_WATCH | RULE_ACTION_REDIRECT => {
                let address = Address::from_u64(b.u64_at(p)?);
                let flags = b.u32_at(p + 8)?;
                let length = b.u16_at(p + 12)?;
                match t & 0x3f {
                    RULE_ACTION_TEE => Rule::ActionTee { address, flags, length },
                    RULE_ACTION_WATCH => Rule::ActionWatch { address, flags, length },
                    _ => Rule::ActionRedirect { address, flags, length },
                }
            }
            RULE_MATCH_SOURCE_ZEROTIER_ADDRESS => Rule::MatchSourceZeroTierAddress {
                sense,
                address: Address::read_from(b, p)?,
            },
            RULE_MATCH_DEST_ZEROTIER_ADDRESS => Rule::MatchDestZeroTierAddress {
                sense,
                address: Address::read_from(b, p)?,
            },
            RULE_MATCH_VLAN_ID => Rule::MatchVlanId { sense, vlan_id: b.u16_at(p)? },
            RULE_MATCH_VLAN_PCP => Rule::MatchVlanPcp { sense, vlan_pcp: b.u8_at(p)? },
            RULE_MATCH_VLAN_DEI => Rule::MatchVlanDei { sense, vlan_dei: b.u8_at(p)? },
            RULE_MATCH_MAC_SOURCE => Rule::MatchMacSource {
                sense,
                mac: b.field(p, 6)?.try_into().unwrap(),
            },
            RULE_MATCH_MAC_DEST => Rule::MatchMacDest {
                sense,
                mac: b.field(p, 6)?.try_into().unwrap(),
            },
            RULE_MATCH_IPV4_SOURCE | RULE_MATCH_IPV4_DEST => {
                let ip: [u8; 4] = b.field(p, 4)?.try_into().unwrap();
                let mask = b.u8_at(p + 4)?;
                if (t & 0x3f) == RULE_MATCH_IPV4_SOURCE {
                    Rule::MatchIpv4Source { sense, ip, mask }
                } else {
                    Rule::MatchIpv4Dest { sense, ip, mask }
                }
            }
            RULE_MATCH_IPV6_SOURCE | RULE_MATCH_IPV6_DEST => {
                let ip: [u8; 16] = b.field(p, 16)?.try_into().unwrap();
                let mask = b.u8_at(p + 16)?;
                if (t & 0x3f) == RULE_MATCH_IPV6_SOURCE {
                    Rule::MatchIpv6Source { sense, ip, mask }
                } else {
                    Rule::MatchIpv6Dest { sense, ip, mask }
                }
            }
            RULE_MATCH_IP_TOS => Rule::MatchIpTos { sense, ip_tos: b.u8_at(p)? },
            RULE_MATCH_IP_PROTOCOL => Rule::MatchIpProtocol { sense, ip_protocol: b.u8_at(p)? },
            RULE_MATCH_ETHERTYPE => Rule::MatchEtherType { sense, ether_type: b.u16_at(p)? },
            RULE_MATCH_ICMP => {
                let icmp_type = b.u8_at(p)?;
                let code = b.u8_at(p + 1)?;
                let flags = b.u8_at(p + 2)?;
                Rule::MatchIcmp {
                    sense,
                    icmp_type,
                    icmp_code: if (flags & 0x01) != 0 { Some(code) } else { None },
                }
            }
            RULE_MATCH_IP_SOURCE_PORT_RANGE => Rule::MatchIpSourcePortRange {
                sense,
                start: b.u16_at(p)?,
                end: b.u16_at(p + 2)?,
            },
            RULE_MATCH_IP_DEST_PORT_RANGE => Rule::MatchIpDestPortRange {
                sense,
                start: b.u16_at(p)?,
                end: b.u16_at(p + 2)?,
            },
            RULE_MATCH_CHARACTERISTICS => Rule::MatchCharacteristics {
                sense,
                characteristics: b.u64_at(p)?,
            },
            RULE_MATCH_FRAME_SIZE_RANGE => Rule::MatchFrameSizeRange {
                sense,
                start: b.u16_at(p)?,
                end: b.u16_at(p + 2)?,
            },
            RULE_MATCH_TAGS_DIFFERENCE | RULE_MATCH_TAGS_BITWISE_AND | RULE_MATCH_TAGS_BITWISE_OR
            | RULE_MATCH_TAGS_BITWISE_XOR | RULE_MATCH_TAGS_EQUAL => {
                let id = b.u32_at(p)?;
                let value = b.u32_at(p + 4)?;
                match t & 0x3f {
                    RULE_MATCH_TAGS_DIFFERENCE => Rule::MatchTagsDifference { sense, id, value },
                    RULE_MATCH_TAGS_BITWISE_AND => Rule::MatchTagsBitwiseAnd { sense, id, value },
                    RULE_MATCH_TAGS_BITWISE_OR => Rule::MatchTagsBitwiseOr { sense, id, value },
                    RULE_MATCH_TAGS_BITWISE_XOR => Rule::MatchTagsBitwiseXor { sense, id, value },
                    _ => Rule::MatchTagsEqual { sense, id, value },
                }
            }
            _ => Rule::Unrecognized { t },
        };

        p += field_len;
        if p > b.size() {
            return Err(ParseError::Truncated);
        }
        Ok((rule, p - start_at))
    }
}

/// Serialize a rules table.
pub fn serialize_rules<const C: usize>(b: &mut Buffer<C>, rules: &[Rule]) -> Result<(), Overflow> {
    for r in rules {
        r.serialize_into(b)?;
    }
    Ok(())
}

/// Deserialize rules starting at `start_at` until the end of the buffer or
/// `max_count` rules, whichever comes first. Returns bytes consumed.
pub fn deserialize_rules<const C: usize>(
    b: &Buffer<C>,
    start_at: usize,
    out: &mut Vec<Rule>,
    max_count: usize,
) -> Result<usize, ParseError> {
    let mut p = start_at;
    while out.len() < max_count && p < b.size() {
        let (rule, consumed) = Rule::deserialize_from(b, p)?;
        out.push(rule);
        p += consumed;
    }
    Ok(p - start_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rules() -> Vec<Rule> {
        let s = MatchSense::default();
        vec![
            Rule::MatchEtherType { sense: s, ether_type: 0x0800 },
            Rule::ActionAccept,
            Rule::MatchIpv4Source {
                sense: MatchSense { not: true, or: false },
                ip: [10, 0, 0, 0],
                mask: 8,
            },
            Rule::MatchIpv6Dest { sense: s, ip: [0xfd; 16], mask: 64 },
            Rule::MatchIcmp { sense: s, icmp_type: 8, icmp_code: None },
            Rule::MatchIcmp { sense: s, icmp_type: 3, icmp_code: Some(1) },
            Rule::MatchTagsEqual { sense: s, id: 9, value: 42 },
            Rule::MatchCharacteristics { sense: s, characteristics: 0x0123456789abcdef },
            Rule::ActionTee {
                address: Address::from_u64(0x89e92ceee5),
                flags: 1,
                length: 128,
            },
            Rule::ActionDrop,
        ]
    }

    #[test]
    fn wire_round_trip() {
        let rules = sample_rules();
        let mut b = Buffer::<4096>::new();
        serialize_rules(&mut b, &rules).unwrap();
        let mut out = Vec::new();
        let consumed = deserialize_rules(&b, 0, &mut out, 1024).unwrap();
        assert_eq!(consumed, b.size());
        assert_eq!(out, rules);
    }

    #[test]
    fn unrecognized_pass_through() {
        // A future rule type with a 4-byte field is carried as opaque and
        // parsing continues past it.
        let mut b = Buffer::<64>::new();
        b.append_u8(0x3e).unwrap();
        b.append_u8(4).unwrap();
        b.append_u32(0xdeadbeef).unwrap();
        Rule::ActionAccept.serialize_into(&mut b).unwrap();

        let mut out = Vec::new();
        deserialize_rules(&b, 0, &mut out, 16).unwrap();
        assert_eq!(out, vec![Rule::Unrecognized { t: 0x3e }, Rule::ActionAccept]);

        // Re-serializing keeps the type byte with an empty field.
        let mut b2 = Buffer::<64>::new();
        serialize_rules(&mut b2, &out).unwrap();
        assert_eq!(b2.data()[..2], [0x3e, 0]);
    }

    #[test]
    fn count_cap_stops_parse() {
        let mut b = Buffer::<64>::new();
        for _ in 0..4 {
            Rule::ActionAccept.serialize_into(&mut b).unwrap();
        }
        let mut out = Vec::new();
        let consumed = deserialize_rules(&b, 0, &mut out, 2).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(consumed, 4);
    }

    #[test]
    fn sense_bits_survive() {
        let r = Rule::MatchVlanId {
            sense: MatchSense { not: true, or: true },
            vlan_id: 12,
        };
        let mut b = Buffer::<16>::new();
        r.serialize_into(&mut b).unwrap();
        assert_eq!(b.u8_at(0).unwrap(), RULE_MATCH_VLAN_ID | 0x80 | 0x40);
        let (r2, _) = Rule::deserialize_from(&b, 0).unwrap();
        assert_eq!(r, r2);
    }
}

/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::buffer::Buffer;
use crate::error::{Overflow, ParseError};

/// Coarse classification of an IP address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum IpScope {
    /// Nil, reserved, or otherwise unusable.
    None,
    Loopback,
    Multicast,
    LinkLocal,
    /// RFC 1918 / fc00::/7.
    Private,
    /// Assigned to things like military networks that will never appear on
    /// the public internet; de-facto private.
    PseudoPrivate,
    /// Carrier-grade NAT space (100.64.0.0/10).
    Shared,
    Global,
}

/// IP address family.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum InetFamily {
    Ipv4,
    Ipv6,
}

/// An IPv4 or IPv6 endpoint.
///
/// The port doubles as a netmask bit count when the address denotes a
/// managed static IP assignment or a route target, mirroring how these
/// appear on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum InetAddress {
    #[default]
    Nil,
    V4 {
        ip: [u8; 4],
        port: u16,
    },
    V6 {
        ip: [u8; 16],
        port: u16,
    },
}

impl InetAddress {
    pub fn v4(ip: [u8; 4], port: u16) -> Self {
        InetAddress::V4 { ip, port }
    }

    pub fn v6(ip: [u8; 16], port: u16) -> Self {
        InetAddress::V6 { ip, port }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, InetAddress::Nil)
    }

    pub fn family(&self) -> Option<InetFamily> {
        match self {
            InetAddress::Nil => None,
            InetAddress::V4 { .. } => Some(InetFamily::Ipv4),
            InetAddress::V6 { .. } => Some(InetFamily::Ipv6),
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            InetAddress::Nil => 0,
            InetAddress::V4 { port, .. } | InetAddress::V6 { port, .. } => *port,
        }
    }

    /// True if the address (ignoring port) is the same.
    pub fn ips_equal(&self, other: &InetAddress) -> bool {
        match (self, other) {
            (InetAddress::V4 { ip: a, .. }, InetAddress::V4 { ip: b, .. }) => a == b,
            (InetAddress::V6 { ip: a, .. }, InetAddress::V6 { ip: b, .. }) => a == b,
            (InetAddress::Nil, InetAddress::Nil) => true,
            _ => false,
        }
    }

    /// True if this looks like a network base address: the port field holds
    /// a partial netmask bit count and all host bits are zero.
    pub fn is_network(&self) -> bool {
        match self {
            InetAddress::Nil => false,
            InetAddress::V4 { ip, port } => {
                let bits = *port as u32;
                if bits == 0 || bits >= 32 {
                    return false;
                }
                let ip = u32::from_be_bytes(*ip);
                (ip & 0xffffffffu32.wrapping_shr(bits)) == 0
            }
            InetAddress::V6 { ip, port } => {
                let bits = *port as u32;
                if bits == 0 || bits >= 128 {
                    return false;
                }
                let ip = u128::from_be_bytes(*ip);
                (ip & u128::MAX.wrapping_shr(bits)) == 0
            }
        }
    }

    /// Classify this address. The table follows long-standing IANA
    /// assignments including the de-facto private "pseudo-private" /8s.
    pub fn ip_scope(&self) -> IpScope {
        match self {
            InetAddress::Nil => IpScope::None,
            InetAddress::V4 { ip, .. } => {
                let ip = u32::from_be_bytes(*ip);
                match ip >> 24 {
                    0x00 => return IpScope::None,          // 0.0.0.0/8 (reserved, never used)
                    0x06 => return IpScope::PseudoPrivate, // 6.0.0.0/8 (US Army)
                    0x0a => return IpScope::Private,       // 10.0.0.0/8
                    0x0b => return IpScope::PseudoPrivate, // 11.0.0.0/8 (US DoD)
                    0x15 => return IpScope::PseudoPrivate, // 21.0.0.0/8 (US DDN-RVN)
                    0x16 => return IpScope::PseudoPrivate, // 22.0.0.0/8 (US DISA)
                    0x19 => return IpScope::PseudoPrivate, // 25.0.0.0/8 (UK Ministry of Defense)
                    0x1a => return IpScope::PseudoPrivate, // 26.0.0.0/8 (US DISA)
                    0x1c => return IpScope::PseudoPrivate, // 28.0.0.0/8 (US DSI-North)
                    0x1d => return IpScope::PseudoPrivate, // 29.0.0.0/8 (US DISA)
                    0x1e => return IpScope::PseudoPrivate, // 30.0.0.0/8 (US DISA)
                    0x33 => return IpScope::PseudoPrivate, // 51.0.0.0/8 (UK Department of Social Security)
                    0x37 => return IpScope::PseudoPrivate, // 55.0.0.0/8 (US DoD)
                    0x38 => return IpScope::PseudoPrivate, // 56.0.0.0/8 (US Postal Service)
                    0x64 => {
                        if (ip & 0xffc00000) == 0x64400000 {
                            return IpScope::Shared; // 100.64.0.0/10
                        }
                    }
                    0x7f => return IpScope::Loopback, // 127.0.0.0/8
                    0xa9 => {
                        if (ip & 0xffff0000) == 0xa9fe0000 {
                            return IpScope::LinkLocal; // 169.254.0.0/16
                        }
                    }
                    0xac => {
                        if (ip & 0xfff00000) == 0xac100000 {
                            return IpScope::Private; // 172.16.0.0/12
                        }
                    }
                    0xc0 => {
                        if (ip & 0xffff0000) == 0xc0a80000 {
                            return IpScope::Private; // 192.168.0.0/16
                        }
                    }
                    0xff => return IpScope::None, // 255.0.0.0/8 (broadcast, or unused/special)
                    _ => {}
                }
                match ip >> 28 {
                    0xe => IpScope::Multicast,     // 224.0.0.0/4
                    0xf => IpScope::PseudoPrivate, // 240.0.0.0/4 ("reserved," usually unusable)
                    _ => IpScope::Global,
                }
            }
            InetAddress::V6 { ip, .. } => {
                if (ip[0] & 0xf0) == 0xf0 {
                    if ip[0] == 0xff {
                        return IpScope::Multicast; // ff00::/8
                    }
                    if ip[0] == 0xfe && (ip[1] & 0xc0) == 0x80 {
                        if ip[2..15].iter().all(|c| *c == 0) && ip[15] == 0x01 {
                            return IpScope::Loopback; // fe80::1
                        }
                        return IpScope::LinkLocal; // fe80::/10
                    }
                    if (ip[0] & 0xfe) == 0xfc {
                        return IpScope::Private; // fc00::/7
                    }
                }
                if ip[..15].iter().all(|c| *c == 0) {
                    if ip[15] == 0x01 {
                        return IpScope::Loopback; // ::1
                    }
                    if ip[15] == 0x00 {
                        return IpScope::None; // ::
                    }
                }
                IpScope::Global
            }
        }
    }

    /// Wire form: type byte 0x00 (nil), 0x04 (v4: 4 IP bytes + port), or
    /// 0x06 (v6: 16 IP bytes + port).
    pub fn serialize_into<const C: usize>(&self, b: &mut Buffer<C>) -> Result<(), Overflow> {
        match self {
            InetAddress::Nil => b.append_u8(0),
            InetAddress::V4 { ip, port } => {
                b.append_u8(0x04)?;
                b.append_bytes(ip)?;
                b.append_u16(*port)
            }
            InetAddress::V6 { ip, port } => {
                b.append_u8(0x06)?;
                b.append_bytes(ip)?;
                b.append_u16(*port)
            }
        }
    }

    /// Returns (address, bytes consumed). Types 0x01-0x03 are reserved
    /// length-prefixed forms that are skipped for forward compatibility.
    pub fn deserialize_from<const C: usize>(b: &Buffer<C>, at: usize) -> Result<(Self, usize), ParseError> {
        let mut p = at;
        let t = b.u8_at(p)?;
        p += 1;
        match t {
            0x00 => Ok((InetAddress::Nil, p - at)),
            0x01..=0x03 => {
                let skip = b.u16_at(p)? as usize;
                p += 2 + skip;
                if p > b.size() {
                    return Err(ParseError::Truncated);
                }
                Ok((InetAddress::Nil, p - at))
            }
            0x04 => {
                let ip: [u8; 4] = b.field(p, 4)?.try_into().unwrap();
                p += 4;
                let port = b.u16_at(p)?;
                p += 2;
                Ok((InetAddress::V4 { ip, port }, p - at))
            }
            0x06 => {
                let ip: [u8; 16] = b.field(p, 16)?.try_into().unwrap();
                p += 16;
                let port = b.u16_at(p)?;
                p += 2;
                Ok((InetAddress::V6 { ip, port }, p - at))
            }
            _ => Err(ParseError::MalformedField),
        }
    }
}

impl std::fmt::Display for InetAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InetAddress::Nil => f.write_str("(null)"),
            InetAddress::V4 { ip, port } => write!(f, "{}/{}", Ipv4Addr::from(*ip), port),
            InetAddress::V6 { ip, port } => write!(f, "{}/{}", Ipv6Addr::from(*ip), port),
        }
    }
}

impl std::str::FromStr for InetAddress {
    type Err = ParseError;

    /// Parse `ip` or `ip/port` where port may be a netmask bit count.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ip, port) = match s.split_once('/') {
            Some((ip, port)) => (ip, port.parse::<u16>().map_err(|_| ParseError::MalformedField)?),
            None => (s, 0),
        };
        if let Ok(v4) = ip.parse::<Ipv4Addr>() {
            return Ok(InetAddress::V4 { ip: v4.octets(), port });
        }
        if let Ok(v6) = ip.parse::<Ipv6Addr>() {
            return Ok(InetAddress::V6 { ip: v6.octets(), port });
        }
        Err(ParseError::MalformedField)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_classification() {
        let s = |a: &str| a.parse::<InetAddress>().unwrap().ip_scope();
        assert_eq!(s("127.0.0.1"), IpScope::Loopback);
        assert_eq!(s("10.1.2.3"), IpScope::Private);
        assert_eq!(s("172.16.0.1"), IpScope::Private);
        assert_eq!(s("172.32.0.1"), IpScope::Global);
        assert_eq!(s("192.168.1.1"), IpScope::Private);
        assert_eq!(s("100.64.0.1"), IpScope::Shared);
        assert_eq!(s("100.128.0.1"), IpScope::Global);
        assert_eq!(s("169.254.10.10"), IpScope::LinkLocal);
        assert_eq!(s("224.0.0.1"), IpScope::Multicast);
        assert_eq!(s("11.0.0.1"), IpScope::PseudoPrivate);
        assert_eq!(s("8.8.8.8"), IpScope::Global);
        assert_eq!(s("0.1.2.3"), IpScope::None);
        assert_eq!(s("::1"), IpScope::Loopback);
        assert_eq!(s("::"), IpScope::None);
        assert_eq!(s("fe80::1"), IpScope::Loopback);
        assert_eq!(s("fe80::2"), IpScope::LinkLocal);
        assert_eq!(s("fc00::1"), IpScope::Private);
        assert_eq!(s("ff02::1"), IpScope::Multicast);
        assert_eq!(s("2001:4860:4860::8888"), IpScope::Global);
        assert_eq!(InetAddress::Nil.ip_scope(), IpScope::None);
    }

    #[test]
    fn text_round_trip() {
        for s in ["10.0.0.1/24", "8.8.8.8/443", "fd00::1/64"] {
            let a = s.parse::<InetAddress>().unwrap();
            assert_eq!(a.to_string(), s);
        }
        assert!("not-an-ip".parse::<InetAddress>().is_err());
    }

    #[test]
    fn wire_round_trip() {
        let mut b = Buffer::<64>::new();
        let addrs = [
            InetAddress::Nil,
            "1.2.3.4/9993".parse().unwrap(),
            "2001:db8::1/9993".parse().unwrap(),
        ];
        for a in &addrs {
            a.serialize_into(&mut b).unwrap();
        }
        let mut p = 0;
        for a in &addrs {
            let (got, used) = InetAddress::deserialize_from(&b, p).unwrap();
            assert_eq!(got, *a);
            p += used;
        }
        assert_eq!(p, b.size());
    }

    #[test]
    fn network_detection() {
        assert!("10.0.0.0/24".parse::<InetAddress>().unwrap().is_network());
        assert!(!"10.0.0.1/24".parse::<InetAddress>().unwrap().is_network());
        assert!(!"10.0.0.0/0".parse::<InetAddress>().unwrap().is_network());
        assert!(!"10.0.0.0/32".parse::<InetAddress>().unwrap().is_network());
        assert!("fd00::/64".parse::<InetAddress>().unwrap().is_network());
        assert!(!"fd00::1/64".parse::<InetAddress>().unwrap().is_network());
    }

    #[test]
    fn ip_equality_ignores_port() {
        let a: InetAddress = "1.2.3.4/5000".parse().unwrap();
        let b: InetAddress = "1.2.3.4/5100".parse().unwrap();
        let c: InetAddress = "1.2.3.5/5000".parse().unwrap();
        assert!(a.ips_equal(&b));
        assert!(!a.ips_equal(&c));
        assert_ne!(a, b);
    }
}

/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

use arrayvec::{ArrayString, ArrayVec};

use crate::address::Address;
use crate::applicationlayer::ApplicationLayer;
use crate::buffer::Buffer;
use crate::capability::Capability;
use crate::credential::{controller_for, Credential};
use crate::dictionary::Dictionary;
use crate::inetaddress::InetAddress;
#[cfg(feature = "legacy-netconf")]
use crate::inetaddress::InetFamily;
use crate::log_event::LogEvent;
use crate::membership::CertificateOfMembership;
use crate::ownership::CertificateOfOwnership;
use crate::proto::*;
use crate::rules::{deserialize_rules, serialize_rules, Rule};
#[cfg(feature = "legacy-netconf")]
use crate::rules::{MatchSense, RULE_ACTION_ACCEPT, RULE_MATCH_ETHERTYPE};
use crate::tag::Tag;

/// Network access control model.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum NetworkType {
    /// Anyone can join; no certificate is required.
    Public,
    /// Members must present a valid certificate of membership.
    #[default]
    Private,
}

/// A statically defined "pushed" route, possibly a default gateway.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Route {
    pub target: InetAddress,
    pub via: InetAddress,
    pub flags: u16,
    pub metric: u16,
}

/// Network configuration received from a network controller.
///
/// This is a plain value: cloning it copies everything, and producers and
/// consumers exchange whole records rather than sharing one. All arrays
/// have compiled-in maxima; a config received from a controller that
/// exceeds them is truncated, not rejected.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct NetworkConfig {
    /// Network ID this configuration applies to.
    pub network_id: u64,

    /// Controller-side time of config generation/issue.
    pub timestamp: u64,

    /// Max difference between timestamp and tag/capability timestamp.
    pub credential_time_max_delta: u64,

    /// Controller-side revision counter for this configuration.
    pub revision: u64,

    /// Address of the member this config was issued to.
    pub issued_to: Address,

    /// Flags (64-bit).
    pub flags: u64,

    /// Maximum number of recipients per multicast (not including active bridges).
    pub multicast_limit: u32,

    /// Network type (currently just public or private).
    pub network_type: NetworkType,

    /// Network short name, or empty if not defined.
    pub name: ArrayString<MAX_NETWORK_SHORT_NAME_LENGTH>,

    /// Specialist devices. The least significant 40 bits of each entry are
    /// the device's address and the most significant 24 bits are role flags.
    pub specialists: ArrayVec<u64, MAX_NETWORK_SPECIALISTS>,

    /// Statically defined "pushed" routes (including default gateways).
    pub routes: ArrayVec<Route, MAX_NETWORK_ROUTES>,

    /// Static IP assignments; netmask bits ride in the port field.
    pub static_ips: ArrayVec<InetAddress, MAX_ZT_ASSIGNED_ADDRESSES>,

    /// Base network rules.
    pub rules: ArrayVec<Rule, MAX_NETWORK_RULES>,

    /// Capabilities for this member, in ascending order of capability ID.
    pub capabilities: ArrayVec<Capability, MAX_NETWORK_CAPABILITIES>,

    /// Tags for this member, in ascending order of tag ID.
    pub tags: ArrayVec<Tag, MAX_NETWORK_TAGS>,

    /// Certificates of ownership for this member.
    pub certificates_of_ownership: ArrayVec<CertificateOfOwnership, MAX_CERTIFICATES_OF_OWNERSHIP>,

    /// Certificate of membership (nil on public networks).
    pub com: CertificateOfMembership,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network_id: 0,
            timestamp: 0,
            credential_time_max_delta: 0,
            revision: 0,
            issued_to: Address::NIL,
            flags: 0,
            multicast_limit: 0,
            network_type: NetworkType::Private,
            name: ArrayString::new(),
            specialists: ArrayVec::new(),
            routes: ArrayVec::new(),
            static_ips: ArrayVec::new(),
            rules: ArrayVec::new(),
            capabilities: ArrayVec::new(),
            tags: ArrayVec::new(),
            certificates_of_ownership: ArrayVec::new(),
            com: CertificateOfMembership::nil(),
        }
    }
}

type ConfigDictionary = Dictionary<NETWORKCONFIG_DICT_CAPACITY>;
type Blob = Buffer<NETWORKCONFIG_DICT_CAPACITY>;

impl NetworkConfig {
    /// True if passive bridging is allowed (experimental).
    pub fn allow_passive_bridging(&self) -> bool {
        (self.flags & NETWORKCONFIG_FLAG_ALLOW_PASSIVE_BRIDGING) != 0
    }

    /// True if the broadcast (ff:ff:ff:ff:ff:ff) address should work.
    pub fn enable_broadcast(&self) -> bool {
        (self.flags & NETWORKCONFIG_FLAG_ENABLE_BROADCAST) != 0
    }

    /// True if IPv6 NDP emulation should be used for certain "magic"
    /// IPv6 address patterns.
    pub fn ndp_emulation(&self) -> bool {
        (self.flags & NETWORKCONFIG_FLAG_ENABLE_IPV6_NDP_EMULATION) != 0
    }

    /// True if frames should not be compressed.
    pub fn disable_compression(&self) -> bool {
        (self.flags & NETWORKCONFIG_FLAG_DISABLE_COMPRESSION) != 0
    }

    /// Network type is public (no access control).
    pub fn is_public(&self) -> bool {
        self.network_type == NetworkType::Public
    }

    /// Network type is private (certificate access control).
    pub fn is_private(&self) -> bool {
        self.network_type == NetworkType::Private
    }

    /// True if this config was successfully parsed from a controller.
    pub fn is_valid(&self) -> bool {
        self.network_id != 0
    }

    /// Addresses of devices on this network designated as active bridges.
    pub fn active_bridges(&self) -> Vec<Address> {
        self.specialists
            .iter()
            .filter(|s| (**s & SPECIALIST_TYPE_ACTIVE_BRIDGE) != 0)
            .map(|s| Address::from_u64(*s))
            .collect()
    }

    /// Addresses of "anchor" devices on this network.
    pub fn anchors(&self) -> Vec<Address> {
        self.specialists
            .iter()
            .filter(|s| (**s & SPECIALIST_TYPE_ANCHOR) != 0)
            .map(|s| Address::from_u64(*s))
            .collect()
    }

    pub fn is_anchor(&self, a: Address) -> bool {
        self.specialists
            .iter()
            .any(|s| (*s & SPECIALIST_ADDRESS_MASK) == a.to_u64() && (*s & SPECIALIST_TYPE_ANCHOR) != 0)
    }

    /// True if this network allows `from_peer` to bridge other Ethernet
    /// peers onto it.
    pub fn permits_bridging(&self, from_peer: Address) -> bool {
        self.allow_passive_bridging()
            || self
                .specialists
                .iter()
                .any(|s| (*s & SPECIALIST_ADDRESS_MASK) == from_peer.to_u64() && (*s & SPECIALIST_TYPE_ACTIVE_BRIDGE) != 0)
    }

    /// True if `by_peer` may run circuit tests on this network. The
    /// controller always may.
    pub fn circuit_testing_allowed(&self, by_peer: Address) -> bool {
        by_peer == controller_for(self.network_id)
            || self
                .specialists
                .iter()
                .any(|s| (*s & SPECIALIST_ADDRESS_MASK) == by_peer.to_u64() && (*s & SPECIALIST_TYPE_CIRCUIT_TESTER) != 0)
    }

    /// Add a specialist, or OR the role flags into an existing entry for
    /// the same address. Returns false if the table is full.
    pub fn add_specialist(&mut self, a: Address, role_flags: u64) -> bool {
        let aint = a.to_u64();
        for s in self.specialists.iter_mut() {
            if (*s & SPECIALIST_ADDRESS_MASK) == aint {
                *s |= role_flags;
                return true;
            }
        }
        if self.specialists.is_full() {
            return false;
        }
        self.specialists.push(role_flags | aint);
        true
    }

    /// Look up a capability by ID (capabilities are sorted by ID).
    pub fn capability(&self, id: u32) -> Option<&Capability> {
        self.capabilities
            .binary_search_by_key(&id, |c| c.id())
            .ok()
            .map(|i| &self.capabilities[i])
    }

    /// Look up a tag by ID (tags are sorted by ID).
    pub fn tag(&self, id: u32) -> Option<&Tag> {
        self.tags.binary_search_by_key(&id, |t| t.id()).ok().map(|i| &self.tags[i])
    }

    /// Write this network config to a dictionary for transport. Returns
    /// None on overflow. If `include_legacy` is set the deprecated pre-v6
    /// fields are also emitted so old clients can read the result.
    pub fn to_dictionary(&self, include_legacy: bool) -> Option<ConfigDictionary> {
        let mut d = ConfigDictionary::new();
        let mut tmp = Blob::new();

        // Try to put the more human-readable fields first.

        if !d.add_u64(DICT_KEY_VERSION, NETWORKCONFIG_VERSION) {
            return None;
        }
        if !d.add_u64(DICT_KEY_NETWORK_ID, self.network_id) {
            return None;
        }
        if !d.add_u64(DICT_KEY_TIMESTAMP, self.timestamp) {
            return None;
        }
        if !d.add_u64(DICT_KEY_CREDENTIAL_TIME_MAX_DELTA, self.credential_time_max_delta) {
            return None;
        }
        if !d.add_u64(DICT_KEY_REVISION, self.revision) {
            return None;
        }
        if !d.add_u64(DICT_KEY_ISSUED_TO, self.issued_to.to_u64()) {
            return None;
        }
        if !d.add_u64(DICT_KEY_FLAGS, self.flags) {
            return None;
        }
        if !d.add_u64(DICT_KEY_MULTICAST_LIMIT, self.multicast_limit as u64) {
            return None;
        }
        if !d.add_u64(DICT_KEY_TYPE, self.network_type as u64) {
            return None;
        }
        if !d.add_str(DICT_KEY_NAME, &self.name) {
            return None;
        }

        #[cfg(feature = "legacy-netconf")]
        if include_legacy {
            if !self.write_legacy_fields(&mut d) {
                return None;
            }
        }
        #[cfg(not(feature = "legacy-netconf"))]
        let _ = include_legacy;

        // Then add binary blobs.

        if !self.com.is_nil() {
            tmp.clear();
            self.com.serialize_into(&mut tmp, false).ok()?;
            if !d.add(DICT_KEY_COM, tmp.data()) {
                return None;
            }
        }

        tmp.clear();
        for c in self.capabilities.iter() {
            c.serialize_into(&mut tmp, false).ok()?;
        }
        if !tmp.is_empty() && !d.add(DICT_KEY_CAPABILITIES, tmp.data()) {
            return None;
        }

        tmp.clear();
        for t in self.tags.iter() {
            t.serialize_into(&mut tmp, false).ok()?;
        }
        if !tmp.is_empty() && !d.add(DICT_KEY_TAGS, tmp.data()) {
            return None;
        }

        tmp.clear();
        for coo in self.certificates_of_ownership.iter() {
            coo.serialize_into(&mut tmp, false).ok()?;
        }
        if !tmp.is_empty() && !d.add(DICT_KEY_CERTIFICATES_OF_OWNERSHIP, tmp.data()) {
            return None;
        }

        tmp.clear();
        for s in self.specialists.iter() {
            tmp.append_u64(*s).ok()?;
        }
        if !tmp.is_empty() && !d.add(DICT_KEY_SPECIALISTS, tmp.data()) {
            return None;
        }

        tmp.clear();
        for r in self.routes.iter() {
            r.target.serialize_into(&mut tmp).ok()?;
            r.via.serialize_into(&mut tmp).ok()?;
            tmp.append_u16(r.flags).ok()?;
            tmp.append_u16(r.metric).ok()?;
        }
        if !tmp.is_empty() && !d.add(DICT_KEY_ROUTES, tmp.data()) {
            return None;
        }

        tmp.clear();
        for ip in self.static_ips.iter() {
            ip.serialize_into(&mut tmp).ok()?;
        }
        if !tmp.is_empty() && !d.add(DICT_KEY_STATIC_IPS, tmp.data()) {
            return None;
        }

        if !self.rules.is_empty() {
            tmp.clear();
            serialize_rules(&mut tmp, &self.rules).ok()?;
            if !d.add(DICT_KEY_RULES, tmp.data()) {
                return None;
            }
        }

        Some(d)
    }

    #[cfg(feature = "legacy-netconf")]
    fn write_legacy_fields(&self, d: &mut ConfigDictionary) -> bool {
        if !d.add_bool(DICT_KEY_ALLOW_PASSIVE_BRIDGING_OLD, self.allow_passive_bridging()) {
            return false;
        }
        if !d.add_bool(DICT_KEY_ENABLE_BROADCAST_OLD, self.enable_broadcast()) {
            return false;
        }
        if !d.add_bool(DICT_KEY_PRIVATE_OLD, self.is_private()) {
            return false;
        }

        let join = |family: InetFamily| {
            self.static_ips
                .iter()
                .filter(|ip| ip.family() == Some(family))
                .map(|ip| ip.to_string())
                .collect::<Vec<_>>()
                .join(",")
        };
        let v4s = join(InetFamily::Ipv4);
        if !v4s.is_empty() && !d.add_str(DICT_KEY_IPV4_STATIC_OLD, &v4s) {
            return false;
        }
        let v6s = join(InetFamily::Ipv6);
        if !v6s.is_empty() && !d.add_str(DICT_KEY_IPV6_STATIC_OLD, &v6s) {
            return false;
        }

        // Reconstruct the old allowed-ethertype list from the rules table
        // by pairing each ethertype match with a following accept. Only a
        // directly preceding match (or a bare accept) emits; any other
        // intervening match type breaks the pair.
        let mut ets = String::new();
        let mut et = 0u16;
        let mut lastrt = RULE_ACTION_ACCEPT;
        for r in self.rules.iter() {
            let rt = r.rule_type();
            if let Rule::MatchEtherType { ether_type, .. } = r {
                et = *ether_type;
            } else if rt == RULE_ACTION_ACCEPT {
                if lastrt < 32 || lastrt == RULE_MATCH_ETHERTYPE {
                    if !ets.is_empty() {
                        ets.push(',');
                    }
                    ets.push_str(&format!("{:x}", et));
                }
                et = 0;
            }
            lastrt = rt;
        }
        if !ets.is_empty() && !d.add_str(DICT_KEY_ALLOWED_ETHERNET_TYPES_OLD, &ets) {
            return false;
        }

        if !self.com.is_nil() && !d.add_str(DICT_KEY_CERTIFICATE_OF_MEMBERSHIP_OLD, &self.com.to_string_legacy()) {
            return false;
        }

        let ab = self
            .active_bridges()
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(",");
        if !ab.is_empty() && !d.add_str(DICT_KEY_ACTIVE_BRIDGES_OLD, &ab) {
            return false;
        }

        true
    }

    /// Read a network config from a dictionary. Returns None if the
    /// dictionary is invalid; no partial state escapes.
    pub fn from_dictionary<App: ApplicationLayer>(app: &App, d: &ConfigDictionary) -> Option<NetworkConfig> {
        let mut nc = NetworkConfig::default();

        // Fields that are always present, new or old.
        nc.network_id = d.get_ui(DICT_KEY_NETWORK_ID, 0);
        if nc.network_id == 0 {
            return None;
        }
        nc.timestamp = d.get_ui(DICT_KEY_TIMESTAMP, 0);
        nc.credential_time_max_delta = d.get_ui(DICT_KEY_CREDENTIAL_TIME_MAX_DELTA, 0);
        nc.revision = d.get_ui(DICT_KEY_REVISION, 0);
        nc.issued_to = Address::from_u64(d.get_ui(DICT_KEY_ISSUED_TO, 0));
        if nc.issued_to.is_nil() {
            return None;
        }
        nc.multicast_limit = d.get_ui(DICT_KEY_MULTICAST_LIMIT, 0) as u32;
        if let Some(name) = d.get_str(DICT_KEY_NAME) {
            let mut name = name.as_str();
            while name.len() > MAX_NETWORK_SHORT_NAME_LENGTH {
                let mut end = name.len() - 1;
                while !name.is_char_boundary(end) {
                    end -= 1;
                }
                name = &name[..end];
            }
            nc.name = ArrayString::from(name).unwrap();
        }

        if d.get_ui(DICT_KEY_VERSION, 0) < NETWORKCONFIG_MIN_MODERN_VERSION {
            #[cfg(feature = "legacy-netconf")]
            {
                nc.read_legacy_fields(d)?;
            }
            #[cfg(not(feature = "legacy-netconf"))]
            return None;
        } else if nc.read_modern_fields(app, d).is_none() {
            return None;
        }

        Some(nc)
    }

    fn read_modern_fields<App: ApplicationLayer>(&mut self, app: &App, d: &ConfigDictionary) -> Option<()> {
        self.flags = d.get_ui(DICT_KEY_FLAGS, 0);
        self.network_type = match d.get_ui(DICT_KEY_TYPE, 1) {
            0 => NetworkType::Public,
            _ => NetworkType::Private,
        };

        if let Some(blob) = d.get(DICT_KEY_COM) {
            let b = Blob::from_bytes(&blob).ok()?;
            let (com, _) = CertificateOfMembership::deserialize_from(&b, 0).ok()?;
            self.com = com;
        }

        if let Some(blob) = d.get(DICT_KEY_CAPABILITIES) {
            let b = Blob::from_bytes(&blob).ok()?;
            let mut p = 0;
            let mut dropped = false;
            while p < b.size() {
                // A malformed entry abandons the rest of the blob but keeps
                // what was already read.
                let (cap, consumed) = match Capability::deserialize_from(&b, p) {
                    Ok(x) => x,
                    Err(_) => break,
                };
                p += consumed;
                if self.capabilities.try_push(cap).is_err() {
                    dropped = true;
                }
            }
            self.capabilities.sort_unstable_by_key(|c| c.id());
            if dropped {
                app.event_log(LogEvent::NetworkConfigFieldTruncated {
                    network_id: self.network_id,
                    field: "capabilities",
                });
            }
        }

        if let Some(blob) = d.get(DICT_KEY_TAGS) {
            let b = Blob::from_bytes(&blob).ok()?;
            let mut p = 0;
            let mut dropped = false;
            while p < b.size() {
                let (tag, consumed) = match Tag::deserialize_from(&b, p) {
                    Ok(x) => x,
                    Err(_) => break,
                };
                p += consumed;
                if self.tags.try_push(tag).is_err() {
                    dropped = true;
                }
            }
            self.tags.sort_unstable_by_key(|t| t.id());
            if dropped {
                app.event_log(LogEvent::NetworkConfigFieldTruncated {
                    network_id: self.network_id,
                    field: "tags",
                });
            }
        }

        if let Some(blob) = d.get(DICT_KEY_CERTIFICATES_OF_OWNERSHIP) {
            let b = Blob::from_bytes(&blob).ok()?;
            let mut p = 0;
            let mut dropped = false;
            while p < b.size() {
                let (coo, consumed) = CertificateOfOwnership::deserialize_from(&b, p).ok()?;
                p += consumed;
                if self.certificates_of_ownership.try_push(coo).is_err() {
                    dropped = true;
                }
            }
            if dropped {
                app.event_log(LogEvent::NetworkConfigFieldTruncated {
                    network_id: self.network_id,
                    field: "certificatesOfOwnership",
                });
            }
        }

        if let Some(blob) = d.get(DICT_KEY_SPECIALISTS) {
            let b = Blob::from_bytes(&blob).ok()?;
            let mut p = 0;
            let mut dropped = false;
            while p + 8 <= b.size() {
                if self.specialists.try_push(b.u64_at(p).ok()?).is_err() {
                    dropped = true;
                }
                p += 8;
            }
            if dropped {
                app.event_log(LogEvent::NetworkConfigFieldTruncated {
                    network_id: self.network_id,
                    field: "specialists",
                });
            }
        }

        if let Some(blob) = d.get(DICT_KEY_ROUTES) {
            let b = Blob::from_bytes(&blob).ok()?;
            let mut p = 0;
            while p < b.size() && !self.routes.is_full() {
                let (target, consumed) = InetAddress::deserialize_from(&b, p).ok()?;
                p += consumed;
                let (via, consumed) = InetAddress::deserialize_from(&b, p).ok()?;
                p += consumed;
                let flags = b.u16_at(p).ok()?;
                p += 2;
                let metric = b.u16_at(p).ok()?;
                p += 2;
                self.routes.push(Route { target, via, flags, metric });
            }
        }

        if let Some(blob) = d.get(DICT_KEY_STATIC_IPS) {
            let b = Blob::from_bytes(&blob).ok()?;
            let mut p = 0;
            while p < b.size() && !self.static_ips.is_full() {
                let (ip, consumed) = InetAddress::deserialize_from(&b, p).ok()?;
                p += consumed;
                self.static_ips.push(ip);
            }
        }

        if let Some(blob) = d.get(DICT_KEY_RULES) {
            let b = Blob::from_bytes(&blob).ok()?;
            let mut rules = Vec::new();
            deserialize_rules(&b, 0, &mut rules, MAX_NETWORK_RULES).ok()?;
            self.rules = rules.into_iter().collect();
        }

        Some(())
    }

    #[cfg(feature = "legacy-netconf")]
    fn read_legacy_fields(&mut self, d: &ConfigDictionary) -> Option<()> {
        if d.get_b(DICT_KEY_ALLOW_PASSIVE_BRIDGING_OLD, false) {
            self.flags |= NETWORKCONFIG_FLAG_ALLOW_PASSIVE_BRIDGING;
        }
        if d.get_b(DICT_KEY_ENABLE_BROADCAST_OLD, false) {
            self.flags |= NETWORKCONFIG_FLAG_ENABLE_BROADCAST;
        }
        // Always enabled for old-style netconf.
        self.flags |= NETWORKCONFIG_FLAG_ENABLE_IPV6_NDP_EMULATION;
        self.network_type = if d.get_b(DICT_KEY_PRIVATE_OLD, true) {
            NetworkType::Private
        } else {
            NetworkType::Public
        };

        for key in [DICT_KEY_IPV4_STATIC_OLD, DICT_KEY_IPV6_STATIC_OLD] {
            if let Some(list) = d.get_str(key) {
                for f in list.split(',').filter(|f| !f.is_empty()) {
                    if self.static_ips.is_full() {
                        break;
                    }
                    if let Ok(ip) = f.parse::<InetAddress>() {
                        // IPs that end in all zeroes are routes with no
                        // assignment in them.
                        if !ip.is_network() {
                            self.static_ips.push(ip);
                        }
                    }
                }
            }
        }

        if let Some(com) = d.get_str(DICT_KEY_CERTIFICATE_OF_MEMBERSHIP_OLD) {
            if let Some(com) = CertificateOfMembership::from_string_legacy(&com) {
                self.com = com;
            }
        }

        if let Some(ets) = d.get_str(DICT_KEY_ALLOWED_ETHERNET_TYPES_OLD) {
            for f in ets.split(',').filter(|f| !f.is_empty()) {
                let et = (crate::utils::hex_str_to_u64(f) & 0xffff) as u16;
                if self.rules.len() + 2 > MAX_NETWORK_RULES {
                    break;
                }
                if et > 0 {
                    self.rules.push(Rule::MatchEtherType {
                        sense: MatchSense::default(),
                        ether_type: et,
                    });
                }
                self.rules.push(Rule::ActionAccept);
            }
        } else {
            self.rules.push(Rule::ActionAccept);
        }

        if let Some(ab) = d.get_str(DICT_KEY_ACTIVE_BRIDGES_OLD) {
            for f in ab.split(',').filter(|f| !f.is_empty()) {
                self.add_specialist(
                    Address::from_u64(crate::utils::hex_str_to_u64(f)),
                    SPECIALIST_TYPE_ACTIVE_BRIDGE,
                );
            }
        }

        Some(())
    }
}

/// Parse a raw NETWORK_CONFIG_REPLY payload into a config.
pub fn config_from_bytes<App: ApplicationLayer>(app: &App, data: &[u8]) -> Option<NetworkConfig> {
    let d = ConfigDictionary::from_bytes(data)?;
    NetworkConfig::from_dictionary(app, &d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_address() {
        assert_eq!(controller_for(0x8056c2e21c000001).to_u64(), 0x8056c2e21c);
    }

    #[test]
    fn specialist_helpers() {
        let mut nc = NetworkConfig {
            network_id: 0x8056c2e21c000001,
            ..Default::default()
        };
        let a = Address::from_u64(0x1111111111);
        let b = Address::from_u64(0x2222222222);
        assert!(nc.add_specialist(a, SPECIALIST_TYPE_ACTIVE_BRIDGE));
        assert!(nc.add_specialist(b, SPECIALIST_TYPE_ANCHOR));
        // OR-merge into the existing slot rather than appending.
        assert!(nc.add_specialist(a, SPECIALIST_TYPE_CIRCUIT_TESTER));
        assert_eq!(nc.specialists.len(), 2);

        assert_eq!(nc.active_bridges(), vec![a]);
        assert_eq!(nc.anchors(), vec![b]);
        assert!(nc.is_anchor(b));
        assert!(!nc.is_anchor(a));
        assert!(nc.permits_bridging(a));
        assert!(!nc.permits_bridging(b));
        assert!(nc.circuit_testing_allowed(a));
        assert!(nc.circuit_testing_allowed(Address::from_u64(0x8056c2e21c)));
        assert!(!nc.circuit_testing_allowed(b));
    }
}

/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

use arrayvec::ArrayString;

use ztcore::dictionary::Dictionary;
use ztcore::inetaddress::{InetFamily, IpScope};
use ztcore::membership::CertificateOfMembership;
use ztcore::proto::*;
use ztcore::rules::{MatchSense, Rule};
use ztcore::{
    Address, ApplicationLayer, Capability, CertificateOfOwnership, NetworkConfig, NetworkType, PeerPathReset, Route,
    Tag,
};

struct NullPeer;
impl PeerPathReset for NullPeer {
    fn reset_within_scope(&self, _scope: IpScope, _family: InetFamily, _now: i64) {}
}

struct TestApplication;

impl ApplicationLayer for TestApplication {
    type Identity = ztcore::crypto_impl::Ed25519Identity;
    type Peer = NullPeer;

    fn get_identity(&self, _address: Address) -> Option<Self::Identity> {
        None
    }
    fn request_whois(&self, _address: Address) {}
    fn each_peer(&self, _visitor: &mut dyn FnMut(&NullPeer)) {}
    fn send_user_message(&self, _destination: Address, _message_type: u64, _data: &[u8]) -> bool {
        false
    }
}

const NWID: u64 = 0x8056c2e21c000001;

fn full_config() -> NetworkConfig {
    let mut nc = NetworkConfig {
        network_id: NWID,
        timestamp: 1_000_000,
        credential_time_max_delta: NETWORKCONFIG_DEFAULT_CREDENTIAL_TIME_MAX_MAX_DELTA,
        revision: 42,
        issued_to: Address::from_u64(0x89e92ceee5),
        flags: NETWORKCONFIG_FLAG_ENABLE_BROADCAST | NETWORKCONFIG_FLAG_ENABLE_IPV6_NDP_EMULATION,
        multicast_limit: 32,
        network_type: NetworkType::Private,
        name: ArrayString::from("earth").unwrap(),
        ..Default::default()
    };

    nc.add_specialist(Address::from_u64(0x1111111111), SPECIALIST_TYPE_ACTIVE_BRIDGE);
    nc.add_specialist(Address::from_u64(0x2222222222), SPECIALIST_TYPE_ANCHOR | SPECIALIST_TYPE_CIRCUIT_TESTER);

    nc.routes.push(Route {
        target: "10.147.0.0/16".parse().unwrap(),
        via: ztcore::InetAddress::Nil,
        flags: 0,
        metric: 0,
    });
    nc.routes.push(Route {
        target: "0.0.0.0/0".parse().unwrap(),
        via: "10.147.0.1/0".parse().unwrap(),
        flags: 1,
        metric: 5,
    });

    nc.static_ips.push("10.147.20.1/16".parse().unwrap());
    nc.static_ips.push("fd80:56c2:e21c:0:199:9389:e92c:eee5/88".parse().unwrap());

    nc.rules.push(Rule::MatchEtherType {
        sense: MatchSense::default(),
        ether_type: 0x0800,
    });
    nc.rules.push(Rule::ActionAccept);
    nc.rules.push(Rule::MatchIpv4Source {
        sense: MatchSense { not: true, or: false },
        ip: [10, 0, 0, 0],
        mask: 8,
    });
    nc.rules.push(Rule::ActionDrop);

    // Capabilities and tags are stored sorted by id.
    nc.capabilities.push(Capability::new(NWID, 1_000_000, 7, 1, &[Rule::ActionAccept]));
    nc.capabilities
        .push(Capability::new(NWID, 1_000_000, 9, 1, &[Rule::ActionBreak]));
    nc.tags.push(Tag::new(NWID, 1_000_000, nc.issued_to, 100, 1));
    nc.tags.push(Tag::new(NWID, 1_000_000, nc.issued_to, 200, 2));

    let mut coo = CertificateOfOwnership::new(NWID, 1_000_000, nc.issued_to, 1);
    coo.add_thing_ip(&"10.147.20.1".parse().unwrap());
    nc.certificates_of_ownership.push(coo);

    nc.com = CertificateOfMembership::new(1_000_000, NETWORKCONFIG_DEFAULT_CREDENTIAL_TIME_MAX_MAX_DELTA, NWID, nc.issued_to);

    nc
}

#[test]
fn modern_round_trip() {
    let app = TestApplication;
    let nc = full_config();
    let d = nc.to_dictionary(false).unwrap();
    let nc2 = NetworkConfig::from_dictionary(&app, &d).unwrap();
    assert_eq!(nc, nc2);
}

#[cfg(feature = "legacy-netconf")]
#[test]
fn legacy_fields_do_not_disturb_modern_parse() {
    let app = TestApplication;
    let nc = full_config();
    let with_legacy = NetworkConfig::from_dictionary(&app, &nc.to_dictionary(true).unwrap()).unwrap();
    let without_legacy = NetworkConfig::from_dictionary(&app, &nc.to_dictionary(false).unwrap()).unwrap();
    assert_eq!(with_legacy, without_legacy);
}

#[cfg(feature = "legacy-netconf")]
#[test]
fn legacy_emits_ethertype_pairs() {
    let nc = full_config();
    let d = nc.to_dictionary(true).unwrap();
    // 0x800 pairs with the accept that directly follows it. The later
    // accept... there is none; the drop does not emit.
    assert_eq!(d.get_str(DICT_KEY_ALLOWED_ETHERNET_TYPES_OLD).unwrap(), "800");
    assert_eq!(d.get_str(DICT_KEY_ALLOW_PASSIVE_BRIDGING_OLD).unwrap(), "0");
    assert_eq!(d.get_str(DICT_KEY_ENABLE_BROADCAST_OLD).unwrap(), "1");
    assert_eq!(d.get_str(DICT_KEY_PRIVATE_OLD).unwrap(), "1");
    assert_eq!(d.get_str(DICT_KEY_IPV4_STATIC_OLD).unwrap(), "10.147.20.1/16");
    assert_eq!(d.get_str(DICT_KEY_ACTIVE_BRIDGES_OLD).unwrap(), "1111111111");
    assert!(d.get_str(DICT_KEY_CERTIFICATE_OF_MEMBERSHIP_OLD).is_some());
}

#[cfg(feature = "legacy-netconf")]
#[test]
fn legacy_upgrade() {
    let app = TestApplication;
    let mut d = Dictionary::<NETWORKCONFIG_DICT_CAPACITY>::new();
    assert!(d.add_u64(DICT_KEY_VERSION, 5));
    assert!(d.add_u64(DICT_KEY_NETWORK_ID, NWID));
    assert!(d.add_u64(DICT_KEY_ISSUED_TO, 0x89e92ceee5));
    assert!(d.add_bool(DICT_KEY_ALLOW_PASSIVE_BRIDGING_OLD, true));
    assert!(d.add_bool(DICT_KEY_ENABLE_BROADCAST_OLD, true));
    assert!(d.add_str(DICT_KEY_IPV4_STATIC_OLD, "10.0.0.1/24"));
    assert!(d.add_str(DICT_KEY_ALLOWED_ETHERNET_TYPES_OLD, "800,86dd"));
    assert!(d.add_str(DICT_KEY_ACTIVE_BRIDGES_OLD, "1111111111"));

    let nc = NetworkConfig::from_dictionary(&app, &d).unwrap();
    assert!(nc.allow_passive_bridging());
    assert!(nc.enable_broadcast());
    assert!(nc.ndp_emulation());
    assert!(nc.is_private());
    let expected_ip: ztcore::InetAddress = "10.0.0.1/24".parse().unwrap();
    assert_eq!(nc.static_ips.as_slice(), std::slice::from_ref(&expected_ip));
    assert_eq!(
        nc.rules.as_slice(),
        &[
            Rule::MatchEtherType {
                sense: MatchSense::default(),
                ether_type: 0x0800,
            },
            Rule::ActionAccept,
            Rule::MatchEtherType {
                sense: MatchSense::default(),
                ether_type: 0x86dd,
            },
            Rule::ActionAccept,
        ]
    );
    assert_eq!(nc.active_bridges(), vec![Address::from_u64(0x1111111111)]);
}

#[cfg(feature = "legacy-netconf")]
#[test]
fn legacy_without_ethertypes_defaults_to_accept() {
    let app = TestApplication;
    let mut d = Dictionary::<NETWORKCONFIG_DICT_CAPACITY>::new();
    assert!(d.add_u64(DICT_KEY_VERSION, 5));
    assert!(d.add_u64(DICT_KEY_NETWORK_ID, NWID));
    assert!(d.add_u64(DICT_KEY_ISSUED_TO, 0x89e92ceee5));
    let nc = NetworkConfig::from_dictionary(&app, &d).unwrap();
    assert_eq!(nc.rules.as_slice(), &[Rule::ActionAccept]);
}

#[cfg(feature = "legacy-netconf")]
#[test]
fn legacy_rejects_network_addresses() {
    let app = TestApplication;
    let mut d = Dictionary::<NETWORKCONFIG_DICT_CAPACITY>::new();
    assert!(d.add_u64(DICT_KEY_VERSION, 5));
    assert!(d.add_u64(DICT_KEY_NETWORK_ID, NWID));
    assert!(d.add_u64(DICT_KEY_ISSUED_TO, 0x89e92ceee5));
    assert!(d.add_str(DICT_KEY_IPV4_STATIC_OLD, "10.0.0.0/24,10.0.0.7/24"));
    let nc = NetworkConfig::from_dictionary(&app, &d).unwrap();
    let expected_ip: ztcore::InetAddress = "10.0.0.7/24".parse().unwrap();
    assert_eq!(nc.static_ips.as_slice(), std::slice::from_ref(&expected_ip));
}

#[test]
fn zero_network_id_rejected() {
    let app = TestApplication;
    let mut d = Dictionary::<NETWORKCONFIG_DICT_CAPACITY>::new();
    assert!(d.add_u64(DICT_KEY_VERSION, NETWORKCONFIG_VERSION));
    assert!(d.add_u64(DICT_KEY_NETWORK_ID, 0));
    assert!(d.add_u64(DICT_KEY_ISSUED_TO, 0x89e92ceee5));
    assert!(NetworkConfig::from_dictionary(&app, &d).is_none());
}

#[test]
fn zero_issued_to_rejected() {
    let app = TestApplication;
    let mut d = Dictionary::<NETWORKCONFIG_DICT_CAPACITY>::new();
    assert!(d.add_u64(DICT_KEY_VERSION, NETWORKCONFIG_VERSION));
    assert!(d.add_u64(DICT_KEY_NETWORK_ID, NWID));
    assert!(NetworkConfig::from_dictionary(&app, &d).is_none());
}

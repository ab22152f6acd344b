/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

use std::collections::HashMap;
use std::sync::Mutex;

use rand_core::OsRng;

use ztcore::buffer::Buffer;
use ztcore::crypto::Identity;
use ztcore::crypto_impl::Ed25519Identity;
use ztcore::inetaddress::{InetFamily, IpScope};
use ztcore::membership::CertificateOfMembership;
use ztcore::ownership::Thing;
use ztcore::{
    controller_for, Address, ApplicationLayer, Capability, CertificateOfOwnership, Credential, PeerPathReset, Tag,
    VerifyResult,
};

struct NullPeer;
impl PeerPathReset for NullPeer {
    fn reset_within_scope(&self, _scope: IpScope, _family: InetFamily, _now: i64) {}
}

struct TestApplication {
    identities: Mutex<HashMap<Address, Ed25519Identity>>,
    whois_requests: Mutex<Vec<Address>>,
}

impl TestApplication {
    fn new() -> Self {
        Self {
            identities: Mutex::new(HashMap::new()),
            whois_requests: Mutex::new(Vec::new()),
        }
    }

    fn learn(&self, id: &Ed25519Identity) {
        self.identities.lock().unwrap().insert(id.address(), id.public_only());
    }
}

impl ApplicationLayer for TestApplication {
    type Identity = Ed25519Identity;
    type Peer = NullPeer;

    fn get_identity(&self, address: Address) -> Option<Ed25519Identity> {
        self.identities.lock().unwrap().get(&address).cloned()
    }

    fn request_whois(&self, address: Address) {
        self.whois_requests.lock().unwrap().push(address);
    }

    fn each_peer(&self, _visitor: &mut dyn FnMut(&NullPeer)) {}

    fn send_user_message(&self, _destination: Address, _message_type: u64, _data: &[u8]) -> bool {
        false
    }
}

/// A network id whose controller is the given identity.
fn network_for(controller: &Ed25519Identity, network_number: u64) -> u64 {
    controller.address().to_u64().wrapping_shl(24) | (network_number & 0xffffff)
}

#[test]
fn tag_sign_and_verify() {
    let app = TestApplication::new();
    let controller = Ed25519Identity::generate(&mut OsRng);
    let nwid = network_for(&controller, 1);
    assert_eq!(controller_for(nwid), controller.address());

    let mut tag = Tag::new(nwid, 10_000, Address::from_u64(0x1122334455), 600, 2);
    assert!(tag.sign(&controller));

    // Signer identity not yet cached: verification asks for WHOIS.
    assert_eq!(tag.verify(&app), VerifyResult::WaitingForIdentity);
    assert_eq!(app.whois_requests.lock().unwrap().as_slice(), &[controller.address()]);

    app.learn(&controller);
    assert_eq!(tag.verify(&app), VerifyResult::Ok);
}

#[test]
fn tag_signed_by_non_controller_is_bad() {
    let app = TestApplication::new();
    let controller = Ed25519Identity::generate(&mut OsRng);
    let impostor = Ed25519Identity::generate(&mut OsRng);
    app.learn(&controller);
    app.learn(&impostor);

    let nwid = network_for(&controller, 1);
    let mut tag = Tag::new(nwid, 1, Address::from_u64(1), 1, 1);
    assert!(tag.sign(&impostor));
    assert_eq!(tag.verify(&app), VerifyResult::Bad);
}

#[test]
fn tag_corrupted_signature_is_bad() {
    let app = TestApplication::new();
    let controller = Ed25519Identity::generate(&mut OsRng);
    app.learn(&controller);

    let nwid = network_for(&controller, 9);
    let mut tag = Tag::new(nwid, 1, Address::from_u64(1), 1, 1);
    assert!(tag.sign(&controller));

    let mut b = Buffer::<4096>::new();
    tag.serialize_into(&mut b, false).unwrap();
    let mut raw = b.data().to_vec();
    raw[40] ^= 0x01; // inside the signature block
    let patched = Buffer::<4096>::from_bytes(&raw).unwrap();
    let (tampered, _) = Tag::deserialize_from(&patched, 0).unwrap();
    assert_eq!(tampered.verify(&app), VerifyResult::Bad);
}

#[test]
fn membership_sign_and_verify() {
    let app = TestApplication::new();
    let controller = Ed25519Identity::generate(&mut OsRng);
    let nwid = network_for(&controller, 2);

    let mut com = CertificateOfMembership::new(50_000, 1_000, nwid, Address::from_u64(0x2233445566));
    assert!(com.sign(&controller));

    assert_eq!(com.verify(&app), VerifyResult::WaitingForIdentity);
    app.learn(&controller);
    assert_eq!(com.verify(&app), VerifyResult::Ok);

    // A certificate for a different network fails the controller check.
    let mut stray = CertificateOfMembership::new(50_000, 1_000, nwid + (1 << 24), Address::from_u64(1));
    assert!(stray.sign(&controller));
    assert_eq!(stray.verify(&app), VerifyResult::Bad);
}

#[test]
fn ownership_sign_verify_and_owns() {
    let app = TestApplication::new();
    let controller = Ed25519Identity::generate(&mut OsRng);
    app.learn(&controller);
    let nwid = network_for(&controller, 3);

    let mac = [0x02u8, 0x11, 0x22, 0x33, 0x44, 0x55];
    let mut coo = CertificateOfOwnership::new(nwid, 60_000, Address::from_u64(0x3344556677), 1);
    assert!(coo.add_thing_mac(&mac));
    assert!(coo.sign(&controller));

    assert_eq!(coo.verify(&app), VerifyResult::Ok);
    assert!(coo.owns(Thing::MacAddress, &mac));
    assert!(!coo.owns(Thing::MacAddress, &[0x02, 0x11, 0x22, 0x33, 0x44, 0x56]));

    // Round trip through the wire preserves the signature.
    let mut b = Buffer::<4096>::new();
    coo.serialize_into(&mut b, false).unwrap();
    let (coo2, _) = CertificateOfOwnership::deserialize_from(&b, 0).unwrap();
    assert_eq!(coo2.verify(&app), VerifyResult::Ok);
}

#[test]
fn capability_custody_chain() {
    let app = TestApplication::new();
    let controller = Ed25519Identity::generate(&mut OsRng);
    let member1 = Ed25519Identity::generate(&mut OsRng);
    let member2 = Ed25519Identity::generate(&mut OsRng);
    app.learn(&controller);
    app.learn(&member1);
    app.learn(&member2);
    let nwid = network_for(&controller, 4);

    let mut cap = Capability::new(nwid, 70_000, 10, 3, &[ztcore::rules::Rule::ActionAccept]);

    // Controller issues to member1.
    assert!(cap.sign(&controller, member1.address()));
    assert_eq!(cap.verify(&app), VerifyResult::Ok);
    assert_eq!(cap.issued_to(), member1.address());
    assert_eq!(cap.signed_by(), controller.address());

    // member1 transfers to member2.
    assert!(cap.sign(&member1, member2.address()));
    assert_eq!(cap.verify(&app), VerifyResult::Ok);
    assert_eq!(cap.issued_to(), member2.address());

    // A transfer by someone who never held it breaks the chain.
    let impostor = Ed25519Identity::generate(&mut OsRng);
    app.learn(&impostor);
    assert!(cap.sign(&impostor, Address::from_u64(5)));
    assert_eq!(cap.verify(&app), VerifyResult::Bad);
}

#[test]
fn capability_issued_by_non_controller_is_bad() {
    let app = TestApplication::new();
    let controller = Ed25519Identity::generate(&mut OsRng);
    let impostor = Ed25519Identity::generate(&mut OsRng);
    app.learn(&controller);
    app.learn(&impostor);
    let nwid = network_for(&controller, 5);

    let mut cap = Capability::new(nwid, 1, 1, 2, &[ztcore::rules::Rule::ActionAccept]);
    assert!(cap.sign(&impostor, Address::from_u64(1)));
    assert_eq!(cap.verify(&app), VerifyResult::Bad);
}

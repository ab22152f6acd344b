/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

use crate::address::Address;
use crate::proto::SIGNATURE_LENGTH;

/// A detached signature as carried in credentials and update meta: a
/// 64-byte Ed25519 signature followed by the first 32 bytes of the SHA-512
/// of the signed message.
pub type Signature = [u8; SIGNATURE_LENGTH];

/// A node identity as consumed by this crate: a 40-bit address bound to
/// key material that can sign and verify.
///
/// The identity primitive itself (key generation, address derivation
/// hardness, serialization) lives with the node; this trait is the seam
/// through which credentials and the update distributor use it. A concrete
/// implementation is provided in `crypto_impl`.
pub trait Identity: Clone {
    fn address(&self) -> Address;

    /// True if this identity includes its secret key and can sign.
    fn has_private(&self) -> bool;

    /// Sign a message, or None if this identity has no secret key.
    fn sign(&self, data: &[u8]) -> Option<Signature>;

    /// Verify a detached signature over a message.
    fn verify(&self, data: &[u8], signature: &[u8]) -> bool;

    /// Public identity in text form (`address:0:hexpublickey`), as used to
    /// name update signing authorities in meta JSON.
    fn public_string(&self) -> String;
}

/// Constant time byte slice equality.
pub fn secure_eq<A: AsRef<[u8]> + ?Sized, B: AsRef<[u8]> + ?Sized>(a: &A, b: &B) -> bool {
    let (a, b) = (a.as_ref(), b.as_ref());
    if a.len() == b.len() {
        let mut x = 0u8;
        for (aa, bb) in a.iter().zip(b.iter()) {
            x |= *aa ^ *bb;
        }
        x == 0
    } else {
        false
    }
}

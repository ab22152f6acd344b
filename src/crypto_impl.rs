/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::CryptoRngCore;
use sha2::{Digest, Sha512};

use crate::address::Address;
use crate::crypto::{secure_eq, Identity, Signature};
use crate::proto::SIGNATURE_LENGTH;
use crate::utils::hex;

/// An Ed25519-backed identity.
///
/// Signatures are 96 bytes: the Ed25519 signature followed by the first 32
/// bytes of the SHA-512 of the message, allowing a cheap pre-check and
/// letting the signed hash travel with the signature.
#[derive(Clone)]
pub struct Ed25519Identity {
    address: Address,
    public: VerifyingKey,
    secret: Option<SigningKey>,
}

fn address_from_public(public: &VerifyingKey) -> Address {
    let digest = Sha512::digest(public.as_bytes());
    Address::from_bytes(digest[..5].try_into().unwrap())
}

impl Ed25519Identity {
    /// Generate a new identity with a secret key, retrying until the
    /// derived address is not reserved.
    pub fn generate<R: CryptoRngCore>(rng: &mut R) -> Self {
        loop {
            let secret = SigningKey::generate(rng);
            let public = secret.verifying_key();
            let address = address_from_public(&public);
            if !address.is_reserved() {
                return Self {
                    address,
                    public,
                    secret: Some(secret),
                };
            }
        }
    }

    /// The same identity with the secret key dropped.
    pub fn public_only(&self) -> Self {
        Self {
            address: self.address,
            public: self.public,
            secret: None,
        }
    }

    pub fn public_key_bytes(&self) -> &[u8; 32] {
        self.public.as_bytes()
    }
}

impl Identity for Ed25519Identity {
    fn address(&self) -> Address {
        self.address
    }

    fn has_private(&self) -> bool {
        self.secret.is_some()
    }

    fn sign(&self, data: &[u8]) -> Option<Signature> {
        let secret = self.secret.as_ref()?;
        let mut sig = [0u8; SIGNATURE_LENGTH];
        sig[..64].copy_from_slice(&secret.sign(data).to_bytes());
        sig[64..].copy_from_slice(&Sha512::digest(data)[..32]);
        Some(sig)
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        if signature.len() != SIGNATURE_LENGTH {
            return false;
        }
        if !secure_eq(&signature[64..], &Sha512::digest(data)[..32]) {
            return false;
        }
        let sig = ed25519_dalek::Signature::from_bytes(signature[..64].try_into().unwrap());
        self.public.verify(data, &sig).is_ok()
    }

    fn public_string(&self) -> String {
        format!("{}:0:{}", self.address, hex(self.public.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    #[test]
    fn sign_verify() {
        let id = Ed25519Identity::generate(&mut OsRng);
        let sig = id.sign(b"message").unwrap();
        assert!(id.verify(b"message", &sig));
        assert!(!id.verify(b"other message", &sig));
        let mut bad = sig;
        bad[3] ^= 1;
        assert!(!id.verify(b"message", &bad));
        assert!(!id.verify(b"message", &sig[..64]));
    }

    #[test]
    fn public_only_cannot_sign() {
        let id = Ed25519Identity::generate(&mut OsRng);
        let public = id.public_only();
        assert!(!public.has_private());
        assert!(public.sign(b"x").is_none());
        assert_eq!(public.address(), id.address());
        assert_eq!(public.public_string(), id.public_string());
        let sig = id.sign(b"x").unwrap();
        assert!(public.verify(b"x", &sig));
    }
}

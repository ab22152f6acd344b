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
use crate::error::Overflow;
use crate::proto::CREDENTIAL_MARSHAL_CAPACITY;

/// Result of checking a credential's signature chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyResult {
    /// Signature(s) valid and the signer is who it must be.
    Ok,

    /// The signer's identity is not cached locally. A WHOIS request has
    /// been issued; retry once the identity is known.
    WaitingForIdentity,

    /// Malformed, signed by the wrong party, or the signature is invalid.
    Bad,
}

/// The controller responsible for a network is identified by the high 40
/// bits of the network ID.
pub fn controller_for(network_id: u64) -> Address {
    Address::from_u64(network_id.wrapping_shr(24))
}

/// Common face of the four network credential types (membership,
/// capability, tag, ownership).
pub trait Credential {
    /// Network this credential applies to.
    fn network_id(&self) -> u64;

    /// Issuance timestamp (controller clock, milliseconds).
    fn timestamp(&self) -> u64;

    /// Who signed this credential. For everything but capability custody
    /// links this must be the network's controller.
    fn signed_by(&self) -> Address;

    /// Serialize into a buffer. In for-sign mode the signature block is
    /// omitted and the output is wrapped in the signing sentinel framing
    /// (except membership certificates, which predate the framing and sign
    /// their packed qualifiers directly).
    fn serialize_into<const C: usize>(&self, b: &mut Buffer<C>, for_sign: bool) -> Result<(), Overflow>;

    /// Check this credential's signature(s), looking up signer identities
    /// through the application layer.
    fn verify<App: ApplicationLayer>(&self, app: &App) -> VerifyResult;
}

/// Serialize a credential into a scratch buffer in for-sign mode.
pub(crate) fn signing_bytes<Cred: Credential>(c: &Cred) -> Option<Buffer<CREDENTIAL_MARSHAL_CAPACITY>> {
    let mut tmp = Buffer::new();
    c.serialize_into(&mut tmp, true).ok()?;
    Some(tmp)
}

/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

use crate::address::Address;
use crate::crypto::Identity;
use crate::inetaddress::{InetFamily, IpScope};
use crate::log_event::LogEvent;

/// A peer as seen by self-awareness: something whose direct physical paths
/// can be reset within one IP scope and family.
pub trait PeerPathReset {
    fn reset_within_scope(&self, scope: IpScope, family: InetFamily, now: i64);
}

/// Trait to implement to integrate this crate into a node.
///
/// Templating the core subsystems on this trait lets the code here be
/// almost entirely transport, OS, and topology independent. The node
/// supplies identity lookup, peer enumeration, and its user-message
/// transport; everything here is driven through these calls and never
/// holds a reference to the node itself.
pub trait ApplicationLayer: Sized {
    type Identity: Identity;
    type Peer: PeerPathReset;

    /// Look up a cached identity by address. Must not block; if the
    /// identity is not already known locally this returns None and the
    /// caller will issue `request_whois`.
    fn get_identity(&self, address: Address) -> Option<Self::Identity>;

    /// Ask the network who an address is. Fire-and-forget; the answer
    /// arrives asynchronously and the caller retries its operation later.
    fn request_whois(&self, address: Address);

    /// Invoke the visitor once per known peer.
    ///
    /// Self-awareness calls this while holding its own lock; the visitor
    /// (and anything it calls on the peer) must not call back into
    /// self-awareness or it will deadlock.
    fn each_peer(&self, visitor: &mut dyn FnMut(&Self::Peer));

    /// Send an opaque user message over the overlay. Returns false if the
    /// message could not be queued; delivery is always best effort.
    fn send_user_message(&self, destination: Address, message_type: u64, data: &[u8]) -> bool;

    /// Events that might be interesting to log or aggregate into metrics.
    #[allow(unused)]
    fn event_log(&self, event: LogEvent) {}
}

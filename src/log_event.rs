/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

use crate::address::Address;
use crate::inetaddress::{InetAddress, IpScope};
use crate::softwareupdater::SoftwareVersion;

/// Node core events that might be interesting to log or aggregate into
/// metrics.
#[derive(Debug)]
pub enum LogEvent {
    /// A trusted peer reported a different external surface for us in the
    /// given scope; all paths in that scope are being reset.
    ExternalSurfaceChanged {
        reporter: Address,
        reporter_physical_address: InetAddress,
        scope: IpScope,
        previous_surface: InetAddress,
        current_surface: InetAddress,
    },

    /// A received network config carried more entries than the compiled-in
    /// cap for the named array; the extras were dropped.
    NetworkConfigFieldTruncated { network_id: u64, field: &'static str },

    /// GET_LATEST was emitted on the periodic check.
    UpdateCheckSent,

    /// A LATEST advertisement was accepted and a download (re)started.
    UpdateLatestAccepted { version: SoftwareVersion, size: u64 },

    /// GET_LATEST from a peer was answered with a newer matching update.
    UpdateServedLatest { origin: Address, version: SoftwareVersion },

    /// A chunk of an update being distributed was served.
    UpdateServedChunk { origin: Address, offset: u64 },

    /// A fully downloaded update passed hash and signature checks and was
    /// staged for install.
    UpdateVerified { version: SoftwareVersion },

    /// A fully downloaded update failed verification and was wiped.
    UpdateVerifyFailed { reason: &'static str },

    /// An update message was unparseable or carried an unknown verb.
    UpdateBadMessage { origin: Address, verb: u8 },
}

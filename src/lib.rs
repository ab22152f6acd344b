/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */
pub mod crypto;
pub mod crypto_impl;

pub mod address;
pub mod applicationlayer;
pub mod buffer;
pub mod capability;
pub mod credential;
pub mod dictionary;
pub mod error;
pub mod inetaddress;
pub mod log_event;
pub mod membership;
pub mod networkconfig;
pub mod ownership;
pub mod proto;
pub mod rules;
pub mod selfawareness;
pub mod softwareupdater;
pub mod tag;
pub mod utils;

pub use crate::address::Address;
pub use crate::applicationlayer::{ApplicationLayer, PeerPathReset};
pub use crate::capability::Capability;
pub use crate::credential::{controller_for, Credential, VerifyResult};
pub use crate::inetaddress::{InetAddress, InetFamily, IpScope};
pub use crate::log_event::LogEvent;
pub use crate::membership::CertificateOfMembership;
pub use crate::networkconfig::{NetworkConfig, NetworkType, Route};
pub use crate::ownership::{CertificateOfOwnership, Thing};
pub use crate::selfawareness::SelfAwareness;
pub use crate::softwareupdater::{SoftwareUpdater, SoftwareVersion, UpdaterConfig};
pub use crate::tag::Tag;

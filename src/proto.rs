/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

/* Common constants */

/// Length of a ZeroTier address in bytes (40 bits).
pub const ADDRESS_LENGTH: usize = 5;
pub(crate) const ADDRESS_RESERVED_PREFIX: u8 = 0xff;

/// Length of a signature as found on the wire in credentials and update meta.
pub const SIGNATURE_LENGTH: usize = 96;

/// Sentinel framing value prepended and appended to a credential's
/// serialized form when producing the bytes that get signed. This is part
/// of the on-wire signed bytes and must never change.
pub(crate) const CREDENTIAL_SIGNING_SENTINEL: u64 = 0x7f7f7f7f7f7f7f7f;

/* Network configuration constants */

/// Network configuration dictionary schema version emitted by this codec.
pub const NETWORKCONFIG_VERSION: u64 = 7;

/// Oldest dictionary schema readable through the modern field set.
pub const NETWORKCONFIG_MIN_MODERN_VERSION: u64 = 6;

/// Default maximum time delta for COMs, tags, and capabilities. Two hours,
/// providing ample time for a controller to experience fail-over.
pub const NETWORKCONFIG_DEFAULT_CREDENTIAL_TIME_MAX_MAX_DELTA: u64 = 7_200_000;

/// Default minimum credential TTL and max delta for COM timestamps. Just
/// over three minutes, providing three retries for all currently online
/// members to refresh.
pub const NETWORKCONFIG_DEFAULT_CREDENTIAL_TIME_MIN_MAX_DELTA: u64 = 185_000;

// Compiled-in maxima for arrays in a network configuration. Arrays read
// from a received blob that exceed these are truncated.
pub const MAX_NETWORK_SPECIALISTS: usize = 256;
pub const MAX_NETWORK_ROUTES: usize = 32;
pub const MAX_ZT_ASSIGNED_ADDRESSES: usize = 16;
pub const MAX_NETWORK_RULES: usize = 1024;
pub const MAX_NETWORK_CAPABILITIES: usize = 128;
pub const MAX_NETWORK_TAGS: usize = 128;
pub const MAX_CERTIFICATES_OF_OWNERSHIP: usize = 4;
pub const MAX_NETWORK_SHORT_NAME_LENGTH: usize = 127;

pub const MAX_CAPABILITY_RULES: usize = 64;
pub const MAX_CAPABILITY_CUSTODY_CHAIN_LENGTH: usize = 7;
pub const MAX_COM_QUALIFIERS: usize = 8;
pub const MAX_COO_THINGS: usize = 16;
pub const COO_THING_VALUE_SIZE: usize = 16;

/// Scratch capacity sufficient to marshal any single credential.
pub(crate) const CREDENTIAL_MARSHAL_CAPACITY: usize = 16384;

/// Dictionary capacity needed for a maximum size network config.
pub const NETWORKCONFIG_DICT_CAPACITY: usize =
    1024 + (MAX_NETWORK_RULES * 32) + (MAX_NETWORK_CAPABILITIES * 4096) + (MAX_NETWORK_TAGS * 256) + (MAX_CERTIFICATES_OF_OWNERSHIP * 1024);

/* Network configuration flags (64-bit field) */

/// Allow passive bridging (experimental).
pub const NETWORKCONFIG_FLAG_ALLOW_PASSIVE_BRIDGING: u64 = 0x0000000000000001;
/// Enable broadcast (ff:ff:ff:ff:ff:ff).
pub const NETWORKCONFIG_FLAG_ENABLE_BROADCAST: u64 = 0x0000000000000002;
/// Enable IPv6 NDP emulation for certain V6 address patterns.
pub const NETWORKCONFIG_FLAG_ENABLE_IPV6_NDP_EMULATION: u64 = 0x0000000000000004;
/// Result of unrecognized MATCH entries in a rules table: match if set.
pub const NETWORKCONFIG_FLAG_RULES_RESULT_OF_UNSUPPORTED_MATCH: u64 = 0x0000000000000008;
/// Disable frame compression.
pub const NETWORKCONFIG_FLAG_DISABLE_COMPRESSION: u64 = 0x0000000000000010;

/* Specialist role flags (high 24 bits of a specialist u64) */

/// Device is an active bridge.
pub const SPECIALIST_TYPE_ACTIVE_BRIDGE: u64 = 0x0000020000000000;
/// Anchors are stable devices on this network that can cache multicast info, etc.
pub const SPECIALIST_TYPE_ANCHOR: u64 = 0x0000040000000000;
/// Device can send circuit tests for this network.
pub const SPECIALIST_TYPE_CIRCUIT_TESTER: u64 = 0x0000080000000000;

pub(crate) const SPECIALIST_ADDRESS_MASK: u64 = 0xffffffffff;

/* Network configuration dictionary keys.
 *
 * These are short so they don't take up much room. By convention upper
 * case is used for binary blobs and lower case for scalars. */

pub const DICT_KEY_VERSION: &str = "v";
pub const DICT_KEY_NETWORK_ID: &str = "nwid";
pub const DICT_KEY_TIMESTAMP: &str = "ts";
pub const DICT_KEY_REVISION: &str = "r";
pub const DICT_KEY_ISSUED_TO: &str = "id";
pub const DICT_KEY_FLAGS: &str = "f";
pub const DICT_KEY_MULTICAST_LIMIT: &str = "ml";
pub const DICT_KEY_TYPE: &str = "t";
pub const DICT_KEY_NAME: &str = "n";
pub const DICT_KEY_CREDENTIAL_TIME_MAX_DELTA: &str = "ctmd";
pub const DICT_KEY_COM: &str = "C";
pub const DICT_KEY_SPECIALISTS: &str = "S";
pub const DICT_KEY_ROUTES: &str = "RT";
pub const DICT_KEY_STATIC_IPS: &str = "I";
pub const DICT_KEY_RULES: &str = "R";
pub const DICT_KEY_CAPABILITIES: &str = "CAP";
pub const DICT_KEY_TAGS: &str = "TAG";
pub const DICT_KEY_CERTIFICATES_OF_OWNERSHIP: &str = "COO";
/// Whole-config signature; reserved, not consumed by this codec.
pub const DICT_KEY_SIGNATURE: &str = "C25519";

/* Legacy dictionary keys, emitted when older clients query and read when
 * the dictionary version is pre-6. */

pub const DICT_KEY_ALLOW_PASSIVE_BRIDGING_OLD: &str = "pb";
pub const DICT_KEY_ENABLE_BROADCAST_OLD: &str = "eb";
pub const DICT_KEY_IPV4_STATIC_OLD: &str = "v4s";
pub const DICT_KEY_IPV6_STATIC_OLD: &str = "v6s";
pub const DICT_KEY_PRIVATE_OLD: &str = "p";
pub const DICT_KEY_ALLOWED_ETHERNET_TYPES_OLD: &str = "et";
pub const DICT_KEY_CERTIFICATE_OF_MEMBERSHIP_OLD: &str = "com";
pub const DICT_KEY_ACTIVE_BRIDGES_OLD: &str = "ab";
/// Reserved; relays are not decoded by this codec.
pub const DICT_KEY_RELAYS_OLD: &str = "rl";

/* Self-awareness constants */

/// Surface entries older than this are evicted. Fairly long since this is
/// just to prevent stale buildup.
pub const SELFAWARENESS_ENTRY_TIMEOUT: i64 = 600_000;

/* Software update constants */

/// One-byte verbs prefixed to update messages.
pub const UPDATE_VERB_GET_LATEST: u8 = 1;
pub const UPDATE_VERB_LATEST: u8 = 2;
pub const UPDATE_VERB_GET_DATA: u8 = 3;
pub const UPDATE_VERB_DATA: u8 = 4;

/// Default user-message type for update traffic.
pub const UPDATE_USER_MESSAGE_TYPE: u64 = 100;

/// Bytes of image payload per DATA message. Fits a single overlay UDP payload.
pub const UPDATE_CHUNK_SIZE: usize = 1400;
/// Hard cap on the size of an update image.
pub const UPDATE_MAX_SIZE: u64 = 128 * 1024 * 1024;
/// How often GET_LATEST is emitted.
pub const UPDATE_CHECK_PERIOD: i64 = 60 * 60 * 1000;
/// Bytes of the full SHA-512 used as a short identifier for an update blob.
pub const UPDATE_HASH_PREFIX_LENGTH: usize = 16;

pub const UPDATE_META_FILENAME: &str = "update.json";
pub const UPDATE_BIN_FILENAME: &str = "update.bin";
pub const UPDATE_DEFAULT_CHANNEL: &str = "release";

/* Software update meta JSON keys */

pub const UPDATE_JSON_VERSION_MAJOR: &str = "vMajor";
pub const UPDATE_JSON_VERSION_MINOR: &str = "vMinor";
pub const UPDATE_JSON_VERSION_REVISION: &str = "vRev";
pub const UPDATE_JSON_VERSION_BUILD: &str = "vBuild";
pub const UPDATE_JSON_PLATFORM: &str = "platform";
pub const UPDATE_JSON_ARCHITECTURE: &str = "arch";
pub const UPDATE_JSON_VENDOR: &str = "vendor";
pub const UPDATE_JSON_CHANNEL: &str = "channel";
pub const UPDATE_JSON_EXPECT_SIGNED_BY: &str = "expectedSigner";
pub const UPDATE_JSON_UPDATE_SIZE: &str = "size";
pub const UPDATE_JSON_UPDATE_HASH: &str = "hash";
pub const UPDATE_JSON_UPDATE_SIGNATURE: &str = "updateSig";
pub const UPDATE_JSON_UPDATE_SIGNED_BY: &str = "updateSignedBy";
pub const UPDATE_JSON_UPDATE_EXEC_ARGS: &str = "updateExecArgs";

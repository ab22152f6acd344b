/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{json, Value};
use sha2::{Digest, Sha512};

use crate::address::Address;
use crate::applicationlayer::ApplicationLayer;
use crate::crypto::Identity;
use crate::log_event::LogEvent;
use crate::proto::*;
use crate::utils::{hex, hex_to_bytes, split_args, AtomicCounter};

/// A software version tuple. Ordering is lexicographic, so any later
/// component breaks ties among equal earlier ones.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct SoftwareVersion {
    pub major: u64,
    pub minor: u64,
    pub revision: u64,
    pub build: u64,
}

impl SoftwareVersion {
    pub fn new(major: u64, minor: u64, revision: u64, build: u64) -> Self {
        Self {
            major,
            minor,
            revision,
            build,
        }
    }

    fn from_meta(meta: &Value) -> Self {
        Self {
            major: json_u64(meta, UPDATE_JSON_VERSION_MAJOR, 0),
            minor: json_u64(meta, UPDATE_JSON_VERSION_MINOR, 0),
            revision: json_u64(meta, UPDATE_JSON_VERSION_REVISION, 0),
            build: json_u64(meta, UPDATE_JSON_VERSION_BUILD, 0),
        }
    }
}

impl std::fmt::Display for SoftwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}_{}", self.major, self.minor, self.revision, self.build)
    }
}

fn json_u64(v: &Value, key: &str, default: u64) -> u64 {
    v.get(key).and_then(Value::as_u64).unwrap_or(default)
}

fn json_str<'a>(v: &'a Value, key: &str, default: &'a str) -> &'a str {
    v.get(key).and_then(Value::as_str).unwrap_or(default)
}

/// Everything the updater needs to know about the node it runs inside.
/// Injected rather than compiled in so tests (and white-label builds) can
/// substitute their own service address and signing authority.
pub struct UpdaterConfig<I: Identity> {
    /// Directory where a verified update is staged.
    pub home: PathBuf,

    /// The well-known address updates are fetched from.
    pub service_address: Address,

    /// User-message type constant for all update traffic.
    pub user_message_type: u64,

    /// Public identity that must have signed any update we install.
    pub signing_authority: I,

    /// Release channel to follow.
    pub channel: String,

    /// Platform, architecture, and vendor codes baked into this build.
    pub platform: u64,
    pub architecture: u64,
    pub vendor: u64,

    /// The version of the software we are running now.
    pub current_version: SoftwareVersion,
}

struct Distributed {
    meta: Value,
    bin: Vec<u8>,
}

#[derive(Default)]
struct UpdaterInner {
    last_check_time: i64,
    latest_meta: Option<Value>,
    latest_valid: bool,
    download: Vec<u8>,
    download_length: u64,
    download_hash_prefix: [u8; UPDATE_HASH_PREFIX_LENGTH],
    dist: HashMap<[u8; UPDATE_HASH_PREFIX_LENGTH], Distributed>,
}

/// Fetches, verifies, and stages signed software updates over the
/// overlay's user-message channel, and (on nodes that carry update images)
/// serves them to others.
///
/// Both roles share one message vocabulary: GET_LATEST asks for the newest
/// matching update's meta, LATEST advertises it, GET_DATA asks for a chunk
/// at an offset, DATA carries one. Downloads are strictly sequential; loss
/// recovery is the periodic re-request in `check`, not retransmission
/// state.
pub struct SoftwareUpdater<App: ApplicationLayer> {
    config: UpdaterConfig<App::Identity>,
    inner: Mutex<UpdaterInner>,
    chunks_served: AtomicCounter,
}

impl<App: ApplicationLayer> SoftwareUpdater<App> {
    /// Create an updater, recovering a previously staged update if one is
    /// present, strictly newer than the running version, and the right
    /// size. Anything else found in the stage is deleted.
    pub fn new(config: UpdaterConfig<App::Identity>) -> Self {
        let mut inner = UpdaterInner::default();

        let meta_path = config.home.join(UPDATE_META_FILENAME);
        let bin_path = config.home.join(UPDATE_BIN_FILENAME);
        if let Ok(raw) = std::fs::read_to_string(&meta_path) {
            if let Ok(meta) = serde_json::from_str::<Value>(&raw) {
                if meta.is_object() && SoftwareVersion::from_meta(&meta) > config.current_version {
                    if let Ok(st) = std::fs::metadata(&bin_path) {
                        if st.len() == json_u64(&meta, UPDATE_JSON_UPDATE_SIZE, 0) {
                            inner.latest_meta = Some(meta);
                            inner.latest_valid = true;
                        }
                    }
                }
            }
        }
        if !inner.latest_valid {
            remove_stage(&config.home);
        }

        Self {
            config,
            inner: Mutex::new(inner),
            chunks_served: AtomicCounter::new(),
        }
    }

    /// Add an update image to the set this node distributes. The meta's
    /// hash is checked against the actual image and its size field is
    /// overridden with the real length. Returns false on any mismatch.
    pub fn add_update_to_distribute(&self, meta_json: &str, bin: Vec<u8>) -> bool {
        let mut meta: Value = match serde_json::from_str(meta_json) {
            Ok(m) => m,
            Err(_) => return false,
        };
        if !meta.is_object() {
            return false;
        }
        let hash = match hex_to_bytes(json_str(&meta, UPDATE_JSON_UPDATE_HASH, "")) {
            Some(h) if h.len() == 64 => h,
            _ => return false,
        };
        if Sha512::digest(&bin).as_slice() != hash.as_slice() {
            return false;
        }
        meta[UPDATE_JSON_UPDATE_SIZE] = json!(bin.len() as u64);

        let mut prefix = [0u8; UPDATE_HASH_PREFIX_LENGTH];
        prefix.copy_from_slice(&hash[..UPDATE_HASH_PREFIX_LENGTH]);
        self.inner.lock().unwrap().dist.insert(prefix, Distributed { meta, bin });
        true
    }

    /// Stop distributing updates and free their images.
    pub fn clear_distributed_updates(&self) {
        self.inner.lock().unwrap().dist.clear();
    }

    /// Total image chunks served to other nodes since startup.
    pub fn chunks_served(&self) -> i64 {
        self.chunks_served.load()
    }

    /// Handle an update user message from `origin`. Malformed or
    /// out-of-sequence messages are ignored.
    pub fn handle_message(&self, app: &App, origin: Address, data: &[u8]) {
        let verb = match data.first() {
            Some(v) => *v,
            None => return,
        };
        match verb {
            UPDATE_VERB_GET_LATEST | UPDATE_VERB_LATEST => {
                let req: Value = match serde_json::from_slice(&data[1..]) {
                    Ok(v) => v,
                    Err(_) => {
                        app.event_log(LogEvent::UpdateBadMessage { origin, verb });
                        return;
                    }
                };
                if !req.is_object() {
                    return;
                }
                if verb == UPDATE_VERB_GET_LATEST {
                    self.handle_get_latest(app, origin, &req);
                } else {
                    self.handle_latest(app, origin, req);
                }
            }

            UPDATE_VERB_GET_DATA => {
                if data.len() < 21 {
                    return;
                }
                let inner = self.inner.lock().unwrap();
                if inner.dist.is_empty() {
                    return;
                }
                let prefix: [u8; UPDATE_HASH_PREFIX_LENGTH] = data[1..17].try_into().unwrap();
                let idx = u32::from_be_bytes(data[17..21].try_into().unwrap()) as usize;
                if let Some(d) = inner.dist.get(&prefix) {
                    if idx < d.bin.len() {
                        let chunk = &d.bin[idx..(idx + UPDATE_CHUNK_SIZE).min(d.bin.len())];
                        let mut reply = Vec::with_capacity(21 + chunk.len());
                        reply.push(UPDATE_VERB_DATA);
                        reply.extend_from_slice(&prefix);
                        reply.extend_from_slice(&(idx as u32).to_be_bytes());
                        reply.extend_from_slice(chunk);
                        app.send_user_message(origin, self.config.user_message_type, &reply);
                        self.chunks_served.increment();
                        app.event_log(LogEvent::UpdateServedChunk { origin, offset: idx as u64 });
                    }
                }
            }

            UPDATE_VERB_DATA => {
                if data.len() < 21 {
                    return;
                }
                let mut inner = self.inner.lock().unwrap();
                if inner.download_length == 0 || inner.download_hash_prefix[..] != data[1..17] {
                    return;
                }
                let idx = u32::from_be_bytes(data[17..21].try_into().unwrap()) as usize;
                // Out-of-order chunks are dropped; the download is strictly
                // sequential.
                if idx != inner.download.len() {
                    return;
                }
                inner.download.extend_from_slice(&data[21..]);
                if (inner.download.len() as u64) < inner.download_length {
                    self.request_next_chunk(app, &inner);
                }
            }

            _ => app.event_log(LogEvent::UpdateBadMessage { origin, verb }),
        }
    }

    fn handle_get_latest(&self, app: &App, origin: Address, req: &Value) {
        let inner = self.inner.lock().unwrap();
        if inner.dist.is_empty() {
            // No reply, since we have nothing to distribute.
            return;
        }

        let expected_signer = json_str(req, UPDATE_JSON_EXPECT_SIGNED_BY, "");
        let req_platform = json_u64(req, UPDATE_JSON_PLATFORM, 0);
        let req_arch = json_u64(req, UPDATE_JSON_ARCHITECTURE, 0);
        let req_vendor = json_u64(req, UPDATE_JSON_VENDOR, 0);
        let req_channel = json_str(req, UPDATE_JSON_CHANNEL, "");

        let mut best_version = SoftwareVersion::from_meta(req);
        let mut latest: Option<&Value> = None;
        for d in inner.dist.values() {
            if json_u64(&d.meta, UPDATE_JSON_PLATFORM, 0) == req_platform
                && json_u64(&d.meta, UPDATE_JSON_ARCHITECTURE, 0) == req_arch
                && json_u64(&d.meta, UPDATE_JSON_VENDOR, 0) == req_vendor
                && json_str(&d.meta, UPDATE_JSON_CHANNEL, "") == req_channel
                && json_str(&d.meta, UPDATE_JSON_UPDATE_SIGNED_BY, "") == expected_signer
            {
                let dv = SoftwareVersion::from_meta(&d.meta);
                if dv > best_version {
                    best_version = dv;
                    latest = Some(&d.meta);
                }
            }
        }

        if let Some(meta) = latest {
            let mut reply = vec![UPDATE_VERB_LATEST];
            reply.extend_from_slice(serde_json::to_string(meta).unwrap_or_default().as_bytes());
            app.send_user_message(origin, self.config.user_message_type, &reply);
            app.event_log(LogEvent::UpdateServedLatest {
                origin,
                version: best_version,
            });
        }
    }

    fn handle_latest(&self, app: &App, origin: Address, meta: Value) {
        if origin != self.config.service_address {
            return;
        }
        let offered = SoftwareVersion::from_meta(&meta);
        if offered <= self.config.current_version {
            return;
        }
        if json_str(&meta, UPDATE_JSON_UPDATE_SIGNED_BY, "") != self.config.signing_authority.public_string() {
            return;
        }
        let len = json_u64(&meta, UPDATE_JSON_UPDATE_SIZE, 0);
        let hash = match hex_to_bytes(json_str(&meta, UPDATE_JSON_UPDATE_HASH, "")) {
            Some(h) => h,
            None => return,
        };
        if len == 0 || len > UPDATE_MAX_SIZE || hash.len() < UPDATE_HASH_PREFIX_LENGTH {
            return;
        }

        let mut inner = self.inner.lock().unwrap();
        if inner.latest_meta.as_ref() != Some(&meta) {
            // A different update than whatever we were downloading; start
            // over from scratch.
            remove_stage(&self.config.home);
            inner.latest_valid = false;
            inner.download = Vec::new();
            inner.download_hash_prefix.copy_from_slice(&hash[..UPDATE_HASH_PREFIX_LENGTH]);
            inner.download_length = len;
            inner.latest_meta = Some(meta);
            app.event_log(LogEvent::UpdateLatestAccepted {
                version: offered,
                size: len,
            });
        }

        if inner.download_length > 0 && (inner.download.len() as u64) < inner.download_length {
            self.request_next_chunk(app, &inner);
        }
    }

    fn request_next_chunk(&self, app: &App, inner: &UpdaterInner) {
        let mut gd = Vec::with_capacity(21);
        gd.push(UPDATE_VERB_GET_DATA);
        gd.extend_from_slice(&inner.download_hash_prefix);
        gd.extend_from_slice(&(inner.download.len() as u32).to_be_bytes());
        app.send_user_message(self.config.service_address, self.config.user_message_type, &gd);
    }

    /// Periodic housekeeping: emits GET_LATEST every check period, nudges
    /// a stalled download, and completes verification of a finished one.
    /// Returns true if a verified update is staged and ready to apply.
    pub fn check(&self, app: &App, now: i64) -> bool {
        let mut inner = self.inner.lock().unwrap();

        if (now - inner.last_check_time) >= UPDATE_CHECK_PERIOD {
            inner.last_check_time = now;
            let req = json!({
                UPDATE_JSON_VERSION_MAJOR: self.config.current_version.major,
                UPDATE_JSON_VERSION_MINOR: self.config.current_version.minor,
                UPDATE_JSON_VERSION_REVISION: self.config.current_version.revision,
                UPDATE_JSON_VERSION_BUILD: self.config.current_version.build,
                UPDATE_JSON_EXPECT_SIGNED_BY: self.config.signing_authority.public_string(),
                UPDATE_JSON_PLATFORM: self.config.platform,
                UPDATE_JSON_ARCHITECTURE: self.config.architecture,
                UPDATE_JSON_VENDOR: self.config.vendor,
                UPDATE_JSON_CHANNEL: self.config.channel,
            });
            let mut msg = vec![UPDATE_VERB_GET_LATEST];
            msg.extend_from_slice(req.to_string().as_bytes());
            app.send_user_message(self.config.service_address, self.config.user_message_type, &msg);
            app.event_log(LogEvent::UpdateCheckSent);
        }

        if inner.latest_valid {
            return true;
        }

        if inner.download_length > 0 {
            if (inner.download.len() as u64) >= inner.download_length {
                // This is the very important security validation part that
                // makes sure this software update doesn't have cooties.
                match self.verify_and_stage(&inner) {
                    Ok(version) => {
                        inner.latest_valid = true;
                        inner.download = Vec::new();
                        inner.download_length = 0;
                        app.event_log(LogEvent::UpdateVerified { version });
                        return true;
                    }
                    Err(reason) => {
                        remove_stage(&self.config.home);
                        inner.latest_meta = None;
                        inner.latest_valid = false;
                        inner.download = Vec::new();
                        inner.download_length = 0;
                        app.event_log(LogEvent::UpdateVerifyFailed { reason });
                    }
                }
            } else {
                self.request_next_chunk(app, &inner);
            }
        }

        false
    }

    fn verify_and_stage(&self, inner: &UpdaterInner) -> Result<SoftwareVersion, &'static str> {
        let meta = inner.latest_meta.as_ref().ok_or("no meta")?;

        // (1) Check the hash itself to make sure the image is intact.
        if hex(Sha512::digest(&inner.download).as_slice()) != json_str(meta, UPDATE_JSON_UPDATE_HASH, "") {
            return Err("hash mismatch");
        }

        // (2) Check the signature by the signing authority.
        let sig = hex_to_bytes(json_str(meta, UPDATE_JSON_UPDATE_SIGNATURE, "")).ok_or("bad signature encoding")?;
        if !self.config.signing_authority.verify(&inner.download, &sig) {
            return Err("signature check failed");
        }

        // (3) Stage meta and image, then lock them down.
        stage_file(
            &self.config.home,
            UPDATE_META_FILENAME,
            serde_json::to_string(meta).unwrap_or_default().as_bytes(),
        )
        .map_err(|_| "stage write failed")?;
        stage_file(&self.config.home, UPDATE_BIN_FILENAME, &inner.download).map_err(|_| "stage write failed")?;

        Ok(SoftwareVersion::from_meta(meta))
    }

    /// Launch the staged update binary with its meta-supplied arguments.
    /// The caller is expected to exit afterwards so the new binary can
    /// take over; no further attempt is made after launching.
    pub fn apply(&self) -> std::io::Result<()> {
        let meta = {
            let inner = self.inner.lock().unwrap();
            match (&inner.latest_meta, inner.latest_valid) {
                (Some(meta), true) => meta.clone(),
                _ => return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no verified update staged")),
            }
        };

        let bin_path = self.config.home.join(UPDATE_BIN_FILENAME);
        if !bin_path.is_file() {
            return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "staged update binary missing"));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&bin_path, std::fs::Permissions::from_mode(0o700))?;
        }

        std::process::Command::new(&bin_path)
            .args(split_args(json_str(&meta, UPDATE_JSON_UPDATE_EXEC_ARGS, "")))
            .spawn()?;
        Ok(())
    }
}

fn remove_stage(home: &Path) {
    let _ = std::fs::remove_file(home.join(UPDATE_META_FILENAME));
    let _ = std::fs::remove_file(home.join(UPDATE_BIN_FILENAME));
}

/// Write a stage file next to its final name, then rename it into place
/// and mark it read-only.
fn stage_file(home: &Path, name: &str, contents: &[u8]) -> std::io::Result<()> {
    let final_path = home.join(name);
    let tmp_path = home.join(format!("{}.tmp", name));
    std::fs::write(&tmp_path, contents)?;
    // A stale read-only target would make the rename fail on some
    // platforms; clear it first.
    if let Ok(st) = std::fs::metadata(&final_path) {
        let mut perm = st.permissions();
        perm.set_readonly(false);
        let _ = std::fs::set_permissions(&final_path, perm);
    }
    std::fs::rename(&tmp_path, &final_path)?;
    let mut perm = std::fs::metadata(&final_path)?.permissions();
    perm.set_readonly(true);
    std::fs::set_permissions(&final_path, perm)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering() {
        let v = SoftwareVersion::new(1, 2, 3, 4);
        assert!(SoftwareVersion::new(1, 2, 3, 5) > v);
        assert!(SoftwareVersion::new(1, 2, 4, 0) > v);
        assert!(SoftwareVersion::new(2, 0, 0, 0) > v);
        assert!(SoftwareVersion::new(1, 2, 3, 3) < v);
        assert_eq!(SoftwareVersion::new(1, 2, 3, 4), v);
        assert_eq!(v.to_string(), "1.2.3_4");
    }

    #[test]
    fn version_from_meta() {
        let meta = json!({
            UPDATE_JSON_VERSION_MAJOR: 1,
            UPDATE_JSON_VERSION_MINOR: 9,
            UPDATE_JSON_VERSION_REVISION: 0,
        });
        assert_eq!(SoftwareVersion::from_meta(&meta), SoftwareVersion::new(1, 9, 0, 0));
    }
}

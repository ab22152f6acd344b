/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::address::Address;
use crate::applicationlayer::{ApplicationLayer, PeerPathReset};
use crate::inetaddress::{InetAddress, IpScope};
use crate::log_event::LogEvent;
use crate::proto::SELFAWARENESS_ENTRY_TIMEOUT;

#[derive(Clone, PartialEq, Eq, Hash)]
struct PhySurfaceKey {
    reporter: Address,
    received_on_local_address: InetAddress,
    reporter_physical_address: InetAddress,
    scope: IpScope,
}

#[derive(Clone, Copy, Default)]
struct PhySurfaceEntry {
    my_surface: InetAddress,
    ts: i64,
    trusted: bool,
}

/// Tracks changes to this node's physical surface as reported by peers,
/// and predicts symmetric NAT mappings.
///
/// Peers that answer our HELLOs tell us the external address they saw us
/// at. When a trusted (upstream) peer reports a surface in some scope that
/// differs from what we had on record, something changed about how the
/// world sees us there and every direct path in that scope is reset so it
/// can re-negotiate.
pub struct SelfAwareness {
    phy: Mutex<HashMap<PhySurfaceKey, PhySurfaceEntry>>,
}

impl SelfAwareness {
    pub fn new() -> Self {
        Self {
            phy: Mutex::new(HashMap::new()),
        }
    }

    /// Called when a remote peer reports the physical address it sees us at.
    ///
    /// `reporter` answered a HELLO sent from `received_on_local_address`;
    /// it was reached at `reporter_physical_address` and reports our
    /// external surface as `my_physical_address`. Trusted reports come
    /// from upstream (root) peers and are the only ones allowed to trigger
    /// path resets.
    pub fn iam<App: ApplicationLayer>(
        &self,
        app: &App,
        reporter: Address,
        received_on_local_address: &InetAddress,
        reporter_physical_address: &InetAddress,
        my_physical_address: &InetAddress,
        trusted: bool,
        now: i64,
    ) {
        let scope = my_physical_address.ip_scope();

        if scope != reporter_physical_address.ip_scope()
            || matches!(scope, IpScope::None | IpScope::Loopback | IpScope::Multicast)
        {
            return;
        }

        let mut phy = self.phy.lock().unwrap();
        let entry = phy
            .entry(PhySurfaceKey {
                reporter,
                received_on_local_address: *received_on_local_address,
                reporter_physical_address: *reporter_physical_address,
                scope,
            })
            .or_default();

        let reset = trusted && (now - entry.ts) < SELFAWARENESS_ENTRY_TIMEOUT && !entry.my_surface.ips_equal(my_physical_address);
        let previous_surface = entry.my_surface;
        entry.my_surface = *my_physical_address;
        entry.ts = now;
        entry.trusted = trusted;

        if reset {
            // A change to our external surface reported by a trusted peer
            // resets all paths in this scope.
            app.event_log(LogEvent::ExternalSurfaceChanged {
                reporter,
                reporter_physical_address: *reporter_physical_address,
                scope,
                previous_surface,
                current_surface: *my_physical_address,
            });

            // Erase all entries in this scope that were not reported from
            // this remote address, to prevent thrashing if multiple peers
            // report conflicting endpoint changes.
            phy.retain(|k, _| k.scope != scope || k.reporter_physical_address == *reporter_physical_address);

            // Reset all paths within this scope and address family. The
            // map lock is still held here; see `each_peer`'s contract.
            if let Some(family) = my_physical_address.family() {
                app.each_peer(&mut |peer| peer.reset_within_scope(scope, family, now));
            }
        }
    }

    /// Evict entries older than the entry timeout.
    pub fn clean(&self, now: i64) {
        self.phy.lock().unwrap().retain(|_, e| (now - e.ts) < SELFAWARENESS_ENTRY_TIMEOUT);
    }

    /// If we appear to be behind a symmetric NAT, return external endpoint
    /// guesses for the ports such a NAT would likely assign next.
    ///
    /// For each global IPv4 address reported by a trusted (upstream) peer,
    /// the freshest port reported by ANY peer for that address is taken and
    /// the next few ports after it are predicted. Only trusted reports may
    /// introduce addresses: otherwise a peer could poison this cache via
    /// OK(HELLO) and coax us into suggesting its address to other peers,
    /// handing it flow metadata it should not get. Untrusted reports may
    /// still refine the port observation, since symmetric NATs advance
    /// ports for every peer alike.
    pub fn get_symmetric_nat_predictions(&self) -> Vec<InetAddress> {
        let mut max_port_by_ip: BTreeMap<[u8; 4], (i64, u16)> = BTreeMap::new();
        let mut the_one_true_surface: Option<InetAddress> = None;
        let mut symmetric = false;
        {
            let phy = self.phy.lock().unwrap();

            // First get addresses from trusted peers only, and detect
            // whether any two of them disagree about our surface.
            for e in phy.values() {
                if let InetAddress::V4 { ip, port } = e.my_surface {
                    if e.trusted && e.my_surface.ip_scope() == IpScope::Global {
                        match the_one_true_surface {
                            None => the_one_true_surface = Some(e.my_surface),
                            Some(s) if s != e.my_surface => symmetric = true,
                            _ => {}
                        }
                        max_port_by_ip.insert(ip, (e.ts, port));
                    }
                }
            }

            // Then refine with the freshest port observation from any peer.
            for e in phy.values() {
                if let InetAddress::V4 { ip, port } = e.my_surface {
                    if e.my_surface.ip_scope() == IpScope::Global {
                        if let Some(mp) = max_port_by_ip.get_mut(&ip) {
                            if mp.0 < e.ts {
                                *mp = (e.ts, port);
                            }
                        }
                    }
                }
            }
        }

        if !symmetric {
            return Vec::new();
        }
        let mut r = Vec::new();
        for k in 1u32..=3 {
            for (ip, (_, port)) in max_port_by_ip.iter() {
                let mut p = *port as u32 + k;
                if p > 65535 {
                    p -= 64511;
                }
                let pred = InetAddress::V4 { ip: *ip, port: p as u16 };
                if !r.contains(&pred) {
                    r.push(pred);
                }
            }
        }
        r
    }

    /// Number of surface entries currently tracked.
    pub fn len(&self) -> usize {
        self.phy.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SelfAwareness {
    fn default() -> Self {
        Self::new()
    }
}

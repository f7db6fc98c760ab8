/**
 * STATUS STORE - Canonical machine list of one board view
 *
 * ROLE: Single source of truth between the probe backend and the view
 * pipeline. Merges the startup bulk snapshot with live push deliveries,
 * always holding exactly one complete snapshot.
 *
 * FLICKER GUARD: a push whose content fingerprint equals the current one is
 * discarded without touching state or the "last updated" timestamp, so
 * repeated identical deliveries never invalidate derived views downstream.
 */

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::models::{Machine, StatusPush};

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

#[derive(Debug, Default)]
struct StoreInner {
    machines: Vec<Machine>,
    fingerprint: u64,
    last_updated: Option<OffsetDateTime>,
}

/// Reconciler for one view's canonical machine list. Cheap to clone; all
/// clones share the same state. Readers get snapshot copies, never live
/// references into the lock.
#[derive(Clone)]
pub struct StatusStore {
    inner: Shared<StoreInner>,
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusStore {
    pub fn new() -> Self {
        Self {
            inner: new_state(StoreInner {
                machines: Vec::new(),
                fingerprint: fleet_fingerprint(&[]),
                last_updated: None,
            }),
        }
    }

    /// Unconditional replacement with the startup snapshot. "Last updated"
    /// becomes the load time, not a backend timestamp.
    pub fn load_initial(&self, machines: Vec<Machine>) {
        let machines = dedup_by_name(machines);
        let fingerprint = fleet_fingerprint(&machines);
        let mut inner = self.inner.lock();
        inner.machines = machines;
        inner.fingerprint = fingerprint;
        inner.last_updated = Some(OffsetDateTime::now_utc());
    }

    /// Applies a full-replacement push. Returns false when the delivery was
    /// a no-op (identical content): state and timestamp stay untouched.
    /// There is no field-level merge and no sequence numbering; an older
    /// push arriving late overwrites newer content (accepted limitation).
    pub fn apply_push(&self, push: StatusPush) -> bool {
        let machines = dedup_by_name(push.machines);
        let fingerprint = fleet_fingerprint(&machines);
        let mut inner = self.inner.lock();
        if fingerprint == inner.fingerprint {
            return false;
        }
        inner.machines = machines;
        inner.fingerprint = fingerprint;
        inner.last_updated = OffsetDateTime::from_unix_timestamp_nanos(push.ts as i128 * 1_000_000).ok();
        true
    }

    /// Read-only snapshot of the canonical list.
    pub fn machines(&self) -> Vec<Machine> {
        self.inner.lock().machines.clone()
    }

    pub fn machine_count(&self) -> usize {
        self.inner.lock().machines.len()
    }

    /// Fingerprint of the current content, used as a memoization key by the
    /// view cache.
    pub fn fingerprint(&self) -> u64 {
        self.inner.lock().fingerprint
    }

    pub fn last_updated(&self) -> Option<OffsetDateTime> {
        self.inner.lock().last_updated
    }

    /// "Last updated" formatted for API payloads, None until the first
    /// accepted delivery.
    pub fn last_updated_rfc3339(&self) -> Option<String> {
        self.last_updated().map(|ts| ts.format(&Rfc3339).unwrap_or_default())
    }

    /// Case-insensitive lookup by machine name.
    pub fn find(&self, name: &str) -> Option<Machine> {
        let wanted = name.to_lowercase();
        self.inner
            .lock()
            .machines
            .iter()
            .find(|m| m.name.to_lowercase() == wanted)
            .cloned()
    }
}

/// Duplicate names inside one delivery resolve silently to the later entry;
/// the earlier row keeps its position, its content is replaced. Latent
/// defect preserved for wire compatibility.
fn dedup_by_name(list: Vec<Machine>) -> Vec<Machine> {
    let mut out: Vec<Machine> = Vec::with_capacity(list.len());
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for machine in list {
        let key = machine.name.to_lowercase();
        match by_name.get(&key) {
            Some(&idx) => out[idx] = machine,
            None => {
                by_name.insert(key, out.len());
                out.push(machine);
            }
        }
    }
    out
}

fn machine_fingerprint(machine: &Machine) -> u64 {
    // Serialized record as the hash input: struct field order is fixed, so
    // identical content always produces identical bytes.
    let mut hasher = DefaultHasher::new();
    serde_json::to_string(machine).unwrap_or_default().hash(&mut hasher);
    hasher.finish()
}

/// Content fingerprint of a whole delivery, combined per machine so one
/// record's hash is computed once and folded in.
pub fn fleet_fingerprint(machines: &[Machine]) -> u64 {
    let mut hasher = DefaultHasher::new();
    machines.len().hash(&mut hasher);
    for machine in machines {
        machine_fingerprint(machine).hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProbeResult, ProbeResults};

    fn machine(name: &str, ping: Option<f64>) -> Machine {
        Machine {
            name: name.to_string(),
            uplink: None,
            source_switch: None,
            column: None,
            bay: None,
            section: None,
            results: ProbeResults {
                ip: ping.map(|ms| ProbeResult {
                    ip: "10.0.0.1".into(),
                    alive: true,
                    ping: Some(ms),
                    color: None,
                }),
                gateway: None,
                kiosk_pc: None,
            },
        }
    }

    #[test]
    fn identical_push_is_suppressed() {
        let store = StatusStore::new();
        let push = StatusPush { machines: vec![machine("A1", Some(4.0))], ts: 1_000 };

        assert!(store.apply_push(push.clone()));
        let ts_after_first = store.last_updated();
        let fp_after_first = store.fingerprint();

        // same content, later timestamp: must not be observable at all
        let replay = StatusPush { machines: push.machines.clone(), ts: 2_000 };
        assert!(!store.apply_push(replay));
        assert_eq!(store.last_updated(), ts_after_first);
        assert_eq!(store.fingerprint(), fp_after_first);
    }

    #[test]
    fn changed_push_replaces_atomically() {
        let store = StatusStore::new();
        store.apply_push(StatusPush { machines: vec![machine("A1", Some(4.0))], ts: 1_000 });

        assert!(store.apply_push(StatusPush { machines: vec![machine("A1", Some(9.0))], ts: 2_000 }));
        let list = store.machines();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].results.ip.as_ref().unwrap().ping, Some(9.0));
        assert_eq!(store.last_updated().unwrap().unix_timestamp(), 2);
    }

    #[test]
    fn load_initial_always_replaces() {
        let store = StatusStore::new();
        store.load_initial(vec![machine("A1", Some(4.0))]);
        let first_stamp = store.last_updated();
        assert!(first_stamp.is_some());

        // even with identical content a fresh bulk load is accepted
        store.load_initial(vec![machine("A1", Some(4.0))]);
        assert_eq!(store.machine_count(), 1);
        assert!(store.last_updated() >= first_stamp);
    }

    #[test]
    fn duplicate_names_resolve_to_later_entry() {
        let store = StatusStore::new();
        store.load_initial(vec![machine("A1", Some(4.0)), machine("a1", Some(80.0)), machine("B2", None)]);

        let list = store.machines();
        assert_eq!(list.len(), 2);
        // later entry's content, earlier entry's position
        assert_eq!(list[0].name, "a1");
        assert_eq!(list[0].results.ip.as_ref().unwrap().ping, Some(80.0));
        assert_eq!(list[1].name, "B2");
    }

    #[test]
    fn find_is_case_insensitive() {
        let store = StatusStore::new();
        store.load_initial(vec![machine("Booth-12", Some(4.0))]);
        assert!(store.find("booth-12").is_some());
        assert!(store.find("BOOTH-12").is_some());
        assert!(store.find("booth-99").is_none());
    }

    #[test]
    fn fingerprint_tracks_content_not_timestamps() {
        let a = vec![machine("A1", Some(4.0))];
        let b = vec![machine("A1", Some(4.0))];
        let c = vec![machine("A1", Some(5.0))];
        assert_eq!(fleet_fingerprint(&a), fleet_fingerprint(&b));
        assert_ne!(fleet_fingerprint(&a), fleet_fingerprint(&c));
        // order matters: a reordered fleet is different content
        let two = vec![machine("A1", Some(4.0)), machine("B2", None)];
        let swapped = vec![machine("B2", None), machine("A1", Some(4.0))];
        assert_ne!(fleet_fingerprint(&two), fleet_fingerprint(&swapped));
    }
}

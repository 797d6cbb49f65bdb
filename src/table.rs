//! Routing table: route-ID → routing rule, with expiry and bulk key
//! reservation. Mirrors the LPM-table/`RoutingManager` split in spirit:
//! a small synchronized `Inner` holds the map, the outer type is cheap to
//! clone and share across the dispatcher, the setup gateway and the
//! background collector.

use crate::descriptor::RouteId;
use crate::error::{Result, RouterError};
use crate::rule::Rule;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

struct StoredRule {
    rule: Rule,
    saved_at: Instant,
}

impl StoredRule {
    fn is_expired(&self, now: Instant) -> bool {
        let elapsed_ms = now.saturating_duration_since(self.saved_at).as_millis() as i64;
        elapsed_ms >= self.rule.keep_alive_ms()
    }
}

struct Inner {
    rules: HashMap<RouteId, StoredRule>,
    reserved: HashSet<RouteId>,
    next_id: u32,
}

impl Inner {
    fn allocate_id(&mut self) -> Option<RouteId> {
        let start = self.next_id;
        loop {
            let candidate = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if !self.rules.contains_key(&candidate) && !self.reserved.contains(&candidate) {
                return Some(candidate);
            }
            if self.next_id == start {
                return None;
            }
        }
    }
}

/// A mapping from route ID to routing rule, safe under concurrent access.
/// Cloning shares the underlying state.
#[derive(Clone)]
pub struct RoutingTable {
    inner: Arc<Mutex<Inner>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        RoutingTable {
            inner: Arc::new(Mutex::new(Inner {
                rules: HashMap::new(),
                reserved: HashSet::new(),
                next_id: 1,
            })),
        }
    }

    /// Allocates `n` fresh non-colliding IDs. Fails `TableFull` if the
    /// table wraps around `u32` before finding `n` free slots.
    pub fn reserve_keys(&self, n: usize) -> Result<Vec<RouteId>> {
        let mut inner = self.inner.lock().unwrap();
        let mut ids = Vec::with_capacity(n);
        for _ in 0..n {
            match inner.allocate_id() {
                Some(id) => {
                    inner.reserved.insert(id);
                    ids.push(id);
                }
                None => return Err(RouterError::TableFull),
            }
        }
        Ok(ids)
    }

    /// Inserts or replaces the rule at `rule.key_route_id()`. Rules whose
    /// key was never reserved are still accepted: the setup plane may push
    /// unsolicited rules.
    pub fn save_rule(&self, rule: Rule) -> Result<RouteId> {
        let id = rule.key_route_id();
        let mut inner = self.inner.lock().unwrap();
        inner.reserved.remove(&id);
        inner.rules.insert(
            id,
            StoredRule {
                rule,
                saved_at: Instant::now(),
            },
        );
        Ok(id)
    }

    /// Returns the current rule for `id`, or `NotFound`/`Expired`. Expired
    /// entries are evicted opportunistically on read.
    pub fn rule(&self, id: RouteId) -> Result<Rule> {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        match inner.rules.get(&id) {
            None => Err(RouterError::NotFound),
            Some(stored) if stored.is_expired(now) => {
                inner.rules.remove(&id);
                Err(RouterError::Expired)
            }
            Some(stored) => Ok(stored.rule.clone()),
        }
    }

    /// Removes each id if present; missing ids are silent no-ops.
    pub fn del_rules(&self, ids: &[RouteId]) {
        let mut inner = self.inner.lock().unwrap();
        for id in ids {
            inner.rules.remove(id);
            inner.reserved.remove(id);
        }
    }

    /// Refreshes a rule's expiry clock without touching its bytes. Used by
    /// the dispatcher on `KeepAlive` packets.
    pub fn touch(&self, id: RouteId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.rules.get_mut(&id) {
            Some(stored) => {
                stored.saved_at = Instant::now();
                Ok(())
            }
            None => Err(RouterError::NotFound),
        }
    }

    /// Snapshot of all live (non-expired) rules.
    pub fn all_rules(&self) -> Vec<Rule> {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        let expired: Vec<RouteId> = inner
            .rules
            .iter()
            .filter(|(_, s)| s.is_expired(now))
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            inner.rules.remove(id);
        }
        inner.rules.values().map(|s| s.rule.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().rules.len()
    }

    /// Sweeps expired rules once. Called by the background collector and
    /// directly by tests that don't want to wait on a timer.
    pub fn sweep(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        let expired: Vec<RouteId> = inner
            .rules
            .iter()
            .filter(|(_, s)| s.is_expired(now))
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            inner.rules.remove(id);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "swept expired routing rules");
        }
        expired.len()
    }

    /// Runs a periodic sweep until `done` is signaled. One task per table,
    /// spawned by the router facade at `Serve` time.
    ///
    /// `closed` is checked at the top of every iteration alongside `done`:
    /// `Notify::notify_waiters` only wakes a waiter registered at the
    /// moment it fires, so a signal arriving while this loop is inside
    /// `sweep()` (outside the `select!` below) would otherwise never be
    /// observed. The flag bounds that gap to one `interval`.
    pub async fn run_collector(self, interval: Duration, done: Arc<tokio::sync::Notify>, closed: Arc<AtomicBool>) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            if closed.load(Ordering::Acquire) {
                warn!("routing table collector shutting down");
                return;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                _ = done.notified() => {
                    warn!("routing table collector shutting down");
                    return;
                }
            }
        }
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PublicKey;
    use uuid::Uuid;

    #[test]
    fn reserve_then_not_found_until_saved() {
        let table = RoutingTable::new();
        let ids = table.reserve_keys(1).unwrap();
        let id = ids[0];
        assert_eq!(table.rule(id).unwrap_err(), RouterError::NotFound);

        let rule = Rule::intermediary_forward(3_600_000, id, 5, Uuid::new_v4());
        table.save_rule(rule).unwrap();
        assert!(table.rule(id).is_ok());

        table.del_rules(&[id]);
        assert_eq!(table.rule(id).unwrap_err(), RouterError::NotFound);
    }

    #[test]
    fn expired_rule_reads_as_expired() {
        let table = RoutingTable::new();
        let ids = table.reserve_keys(2).unwrap();
        let expired_rule = Rule::intermediary_forward(-600_000, ids[0], 3, Uuid::new_v4());
        let live_rule = Rule::intermediary_forward(600_000, ids[1], 3, Uuid::new_v4());
        table.save_rule(expired_rule).unwrap();
        table.save_rule(live_rule).unwrap();
        std::thread::sleep(Duration::from_millis(1));

        assert_eq!(table.rule(ids[0]).unwrap_err(), RouterError::Expired);
        assert_eq!(table.rule(123).unwrap_err(), RouterError::NotFound);
        assert!(table.rule(ids[1]).is_ok());
    }

    #[test]
    fn remove_route_descriptor_matches_exact_ports() {
        let table = RoutingTable::new();
        let pk = PublicKey::from_bytes([7u8; 32]);
        let id = table.reserve_keys(1).unwrap()[0];
        table
            .save_rule(Rule::consume(600_000, id, pk, 2, 3))
            .unwrap();
        assert_eq!(table.count(), 1);

        let all = table.all_rules();
        assert!(!all.iter().any(|r| {
            let d = r.route_descriptor().unwrap();
            d.dst_port == 2 && d.src_port == 3
        }));
    }
}

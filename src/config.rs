//! Construction-time parameters and the well-known constants the original
//! protocol hard-codes. Kept together so a reimplementer tuning timeouts
//! only has one file to read.

use crate::descriptor::{PublicKey, SecretKey};
use std::time::Duration;

/// Depth of the internal queue `AcceptRoutes` drains.
pub const ACCEPT_QUEUE_CAPACITY: usize = 1024;

/// Default keep-alive stamped on freshly dialed routes.
pub const DEFAULT_ROUTE_KEEP_ALIVE_MS: i64 = 2 * 60 * 60 * 1000;

/// How long `DialRoutes` retries the route finder before giving up with
/// `NoRoute`.
pub const ROUTE_FINDER_DEADLINE: Duration = Duration::from_secs(10);

/// Background routing-table collector cadence outside of tests.
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(5);

/// Matches the original implementation's test fixture cadence.
pub const TEST_GC_INTERVAL: Duration = Duration::from_millis(100);

/// Bounds on path length accepted from the route finder.
#[derive(Debug, Clone, Copy)]
pub struct HopLimits {
    pub min_hops: u8,
    pub max_hops: u8,
}

impl Default for HopLimits {
    fn default() -> Self {
        HopLimits {
            min_hops: 0,
            max_hops: 50,
        }
    }
}

/// Per-call tuning for `DialRoutes`.
#[derive(Debug, Clone, Copy)]
pub struct DialOptions {
    pub min_forward_rts: u32,
    pub max_forward_rts: u32,
    pub min_consume_rts: u32,
    pub max_consume_rts: u32,
}

impl Default for DialOptions {
    fn default() -> Self {
        DialOptions {
            min_forward_rts: 1,
            max_forward_rts: 1,
            min_consume_rts: 1,
            max_consume_rts: 1,
        }
    }
}

/// The router's own identity and the operating parameters handed to
/// `Router::new`. Everything here is construction-time; nothing is
/// persisted or reloaded.
pub struct RouterConfig {
    pub public_key: PublicKey,
    pub secret_key: SecretKey,
    pub trusted_setup_nodes: Vec<PublicKey>,
    pub gc_interval: Duration,
    pub setup_listen_addr: std::net::SocketAddr,
}

impl RouterConfig {
    pub fn new(
        public_key: PublicKey,
        secret_key: SecretKey,
        trusted_setup_nodes: Vec<PublicKey>,
        setup_listen_addr: std::net::SocketAddr,
    ) -> Self {
        RouterConfig {
            public_key,
            secret_key,
            trusted_setup_nodes,
            gc_interval: DEFAULT_GC_INTERVAL,
            setup_listen_addr,
        }
    }

    pub fn with_gc_interval(mut self, interval: Duration) -> Self {
        self.gc_interval = interval;
        self
    }
}

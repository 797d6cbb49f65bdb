//! In-memory stand-ins for the external collaborators this crate only
//! consumes through a trait: the transport manager, the route finder and
//! the setup client. Used by the binary's demo mode and by every test in
//! this crate and under `tests/`.

use crate::descriptor::PublicKey;
use crate::error::{Result, RouterError};
use crate::packet::Packet;
use crate::route_finder::{Path, RouteFinder, RouteOptions};
use crate::rule::TransportId;
use crate::setup_client::{BidirectionalRoute, EdgeRules, SetupClient};
use crate::transport::{Transport, TransportManager};
use crossbeam_channel::{Receiver as CbReceiver, Sender as CbSender, unbounded};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub fn gen_public_key() -> PublicKey {
    PublicKey::from_bytes(rand_32())
}

fn rand_32() -> [u8; 32] {
    let mut out = [0u8; 32];
    out[..16].copy_from_slice(Uuid::new_v4().as_bytes());
    out[16..].copy_from_slice(Uuid::new_v4().as_bytes());
    out
}

/// One direction of an in-memory back-to-back transport pair.
pub struct MockTransport {
    id: TransportId,
    peer_inbound: CbSender<Packet>,
}

#[tonic::async_trait]
impl Transport for MockTransport {
    fn id(&self) -> TransportId {
        self.id
    }

    async fn write_packet(&self, pkt: Packet) -> Result<()> {
        self.peer_inbound
            .send(pkt)
            .map_err(|_| RouterError::NotServing)
    }
}

/// A transport manager whose transports are crossbeam channels rather than
/// real byte streams. `connect_pair` wires two of these back to back, the
/// same shape as the two-visor fixture the original test suite built.
pub struct MockTransportManager {
    transports: Mutex<HashMap<TransportId, Arc<MockTransport>>>,
    inbound_tx: CbSender<Packet>,
    inbound_rx: CbReceiver<Packet>,
    closed: AtomicBool,
    close_signal: Arc<tokio::sync::Notify>,
}

impl MockTransportManager {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = unbounded();
        MockTransportManager {
            transports: Mutex::new(HashMap::new()),
            inbound_tx,
            inbound_rx,
            closed: AtomicBool::new(false),
            close_signal: Arc::new(tokio::sync::Notify::new()),
        }
    }

    fn register(&self, id: TransportId, peer_inbound: CbSender<Packet>) {
        self.transports
            .lock()
            .unwrap()
            .insert(id, Arc::new(MockTransport { id, peer_inbound }));
    }

    /// Wires two fresh managers together over one shared transport id,
    /// mirroring a single bidirectional link between adjacent visors.
    pub fn connect_pair() -> (Arc<MockTransportManager>, Arc<MockTransportManager>, TransportId) {
        let a = Arc::new(MockTransportManager::new());
        let b = Arc::new(MockTransportManager::new());
        let id = Uuid::new_v4();
        a.register(id, b.inbound_tx.clone());
        b.register(id, a.inbound_tx.clone());
        (a, b, id)
    }
}

impl Default for MockTransportManager {
    fn default() -> Self {
        Self::new()
    }
}

#[tonic::async_trait]
impl TransportManager for MockTransportManager {
    async fn read_packet(&self) -> Result<Packet> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RouterError::NotServing);
        }
        let rx = self.inbound_rx.clone();
        let recv = tokio::task::spawn_blocking(move || rx.recv());
        let close_signal = self.close_signal.clone();
        tokio::select! {
            _ = close_signal.notified() => Err(RouterError::NotServing),
            joined = recv => match joined {
                Ok(Ok(pkt)) => Ok(pkt),
                _ => Err(RouterError::NotServing),
            },
        }
    }

    fn transport(&self, id: TransportId) -> Option<Arc<dyn Transport>> {
        self.transports
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .map(|t| t as Arc<dyn Transport>)
    }

    async fn serve(&self) -> Result<()> {
        self.close_signal.notified().await;
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.close_signal.notify_waiters();
    }
}

/// Always returns the same canned result; good enough to exercise the
/// retry-until-deadline and happy-path branches of `dial_routes`.
pub struct MockRouteFinder {
    result: Result<(Path, Path)>,
}

impl MockRouteFinder {
    pub fn empty() -> Self {
        MockRouteFinder {
            result: Err(RouterError::NoRoute),
        }
    }

    pub fn always(forward: Path, reverse: Path) -> Self {
        MockRouteFinder {
            result: Ok((forward, reverse)),
        }
    }
}

#[tonic::async_trait]
impl RouteFinder for MockRouteFinder {
    async fn find_routes(
        &self,
        _forward_edge: (PublicKey, PublicKey),
        _backward_edge: (PublicKey, PublicKey),
        _opts: RouteOptions,
    ) -> Result<(Path, Path)> {
        self.result.clone()
    }
}

pub struct MockSetupClient {
    response: Result<EdgeRules>,
}

impl MockSetupClient {
    pub fn failing() -> Self {
        MockSetupClient {
            response: Err(RouterError::SetupFailed("no setup client configured".into())),
        }
    }

    pub fn succeeding(edge: EdgeRules) -> Self {
        MockSetupClient {
            response: Ok(edge),
        }
    }
}

#[tonic::async_trait]
impl SetupClient for MockSetupClient {
    async fn dial_route_group(&self, _route: BidirectionalRoute) -> Result<EdgeRules> {
        self.response.clone()
    }
}

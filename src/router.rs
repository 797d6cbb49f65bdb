//! Router Facade: lifecycle (`serve`, `close`), `dial_routes` /
//! `accept_routes`, and the thread-safe shared state binding the table, the
//! route-group map and the external collaborators together.

use crate::config::{ACCEPT_QUEUE_CAPACITY, DialOptions, HopLimits, RouterConfig};
use crate::descriptor::{Port, PublicKey, RouteDescriptor};
use crate::dispatcher;
use crate::error::{Result, RouterError};
use crate::establisher;
use crate::route_finder::RouteFinder;
use crate::route_group::RouteGroup;
use crate::rule::{Rule, RuleKind};
use crate::setup_client::{EdgeRules, SetupClient};
use crate::table::RoutingTable;
use crate::transport::TransportManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

struct State {
    route_groups: HashMap<RouteDescriptor, Arc<RouteGroup>>,
}

pub struct Router {
    config: RouterConfig,
    table: RoutingTable,
    transport_manager: Arc<dyn TransportManager>,
    route_finder: Arc<dyn RouteFinder>,
    setup_client: Arc<dyn SetupClient>,
    state: Mutex<State>,
    accept_tx: mpsc::Sender<Arc<RouteGroup>>,
    accept_rx: Mutex<mpsc::Receiver<Arc<RouteGroup>>>,
    accept_closed: AtomicBool,
    done: Arc<Notify>,
    closed: Arc<AtomicBool>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl Router {
    pub fn new(
        config: RouterConfig,
        table: RoutingTable,
        transport_manager: Arc<dyn TransportManager>,
        route_finder: Arc<dyn RouteFinder>,
        setup_client: Arc<dyn SetupClient>,
    ) -> Arc<Self> {
        let (accept_tx, accept_rx) = mpsc::channel(ACCEPT_QUEUE_CAPACITY);
        Arc::new(Router {
            config,
            table,
            transport_manager,
            route_finder,
            setup_client,
            state: Mutex::new(State {
                route_groups: HashMap::new(),
            }),
            accept_tx,
            accept_rx: Mutex::new(accept_rx),
            accept_closed: AtomicBool::new(false),
            done: Arc::new(Notify::new()),
            closed: Arc::new(AtomicBool::new(false)),
            background: Mutex::new(Vec::new()),
        })
    }

    // --- accessors used by the dispatcher / establisher / gateway ---

    pub(crate) fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub(crate) fn transport_manager(&self) -> &Arc<dyn TransportManager> {
        &self.transport_manager
    }

    pub(crate) fn route_finder(&self) -> &Arc<dyn RouteFinder> {
        &self.route_finder
    }

    pub(crate) fn setup_client(&self) -> &Arc<dyn SetupClient> {
        &self.setup_client
    }

    pub(crate) fn done_signal(&self) -> &Notify {
        &self.done
    }

    /// Latched alongside `done`: `notify_waiters` wakes only waiters already
    /// registered at the moment it fires, so a loop iteration that is
    /// between `select!` calls when `close` runs would otherwise never see
    /// it. Checking this flag at the top of every iteration bounds the
    /// missed-wakeup window to one iteration instead of forever.
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn local_public_key(&self) -> PublicKey {
        self.config.public_key
    }

    pub(crate) async fn route_group(&self, desc: &RouteDescriptor) -> Option<Arc<RouteGroup>> {
        self.state.lock().await.route_groups.get(desc).cloned()
    }

    pub(crate) async fn get_or_create_route_group(&self, desc: RouteDescriptor) -> Arc<RouteGroup> {
        self.state
            .lock()
            .await
            .route_groups
            .entry(desc)
            .or_insert_with(|| RouteGroup::new(desc))
            .clone()
    }

    // --- public facade ---

    pub fn setup_is_trusted(&self, pk: PublicKey) -> bool {
        self.config.trusted_setup_nodes.contains(&pk)
    }

    /// Starts the dispatcher and the routing-table collector, then blocks
    /// on the transport manager's own serve loop. Returning from here — for
    /// any reason — releases every resource this router owns.
    pub async fn serve(self: &Arc<Self>) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RouterError::Closed);
        }

        let dispatcher_handle = tokio::spawn(dispatcher::run(self.clone()));
        let gc_handle = tokio::spawn(self.table.clone().run_collector(
            self.config.gc_interval,
            self.done.clone(),
            self.closed.clone(),
        ));
        {
            let mut bg = self.background.lock().await;
            bg.push(dispatcher_handle);
            bg.push(gc_handle);
        }

        let result = self.transport_manager.serve().await;
        self.close().await;
        result
    }

    /// See `establisher::dial_routes`.
    pub async fn dial_routes(
        self: &Arc<Self>,
        remote_pk: PublicKey,
        l_port: Port,
        r_port: Port,
        opts: DialOptions,
    ) -> Result<Arc<RouteGroup>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RouterError::Closed);
        }
        establisher::dial_routes(self, remote_pk, l_port, r_port, opts, HopLimits::default()).await
    }

    /// Blocks until the next `introduce_rules` call lands on the accept
    /// queue, or `cancel` resolves first.
    pub async fn accept_routes<C>(&self, cancel: C) -> Result<Arc<RouteGroup>>
    where
        C: std::future::Future<Output = ()>,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(RouterError::Closed);
        }
        let mut rx = self.accept_rx.lock().await;
        tokio::select! {
            biased;
            _ = self.done.notified() => Err(RouterError::Closed),
            _ = cancel => Err(RouterError::Cancelled),
            maybe = rx.recv() => maybe.ok_or(RouterError::Closed),
        }
    }

    /// Called by the setup gateway. Creates the route group if absent,
    /// resolves the edge's transport, and enqueues it for `accept_routes`.
    /// Blocks (backpressure onto setup) if the accept queue is full.
    pub(crate) async fn introduce_rules(&self, edge: EdgeRules) -> Result<()> {
        if self.accept_closed.load(Ordering::Acquire) || self.closed.load(Ordering::Acquire) {
            return Err(RouterError::Closed);
        }

        let transport_id = edge
            .forward
            .next_transport_id()
            .ok_or(RouterError::NoTransport)?;
        let transport = self
            .transport_manager
            .transport(transport_id)
            .ok_or(RouterError::UnknownTransport)?;

        let group = self.get_or_create_route_group(edge.desc).await;
        group
            .append_edge(edge.forward, edge.reverse, transport)
            .await;

        self.accept_tx
            .send(group)
            .await
            .map_err(|_| RouterError::Closed)
    }

    pub fn save_routing_rules(&self, rules: Vec<Rule>) -> Result<Vec<u32>> {
        rules
            .into_iter()
            .map(|rule| self.table.save_rule(rule))
            .collect()
    }

    pub fn reserve_keys(&self, n: usize) -> Result<Vec<u32>> {
        self.table.reserve_keys(n)
    }

    pub fn rule_count(&self) -> usize {
        self.table.count()
    }

    pub fn rule(&self, id: u32) -> Result<Rule> {
        self.table.rule(id)
    }

    /// Scans all rules for a `Consume` rule matching `desc` on `dstPK`,
    /// `dstPort` and `srcPort` (not `srcPK` — a consume rule's own
    /// descriptor carries a zeroed `srcPK`, but a caller-supplied `desc`
    /// isn't required to) and deletes the first hit.
    pub fn remove_route_descriptor(&self, desc: RouteDescriptor) {
        let target = self.table.all_rules().into_iter().find(|rule| {
            rule.kind() == RuleKind::Consume
                && rule.route_descriptor().is_some_and(|d| {
                    d.dst_pk == desc.dst_pk && d.dst_port == desc.dst_port && d.src_port == desc.src_port
                })
        });
        if let Some(rule) = target {
            self.table.del_rules(&[rule.key_route_id()]);
        }
    }

    /// Idempotent: closes `done`, the accept queue and every background
    /// activity, then releases the transport manager. Safe to call
    /// concurrently with in-flight operations, which observe `Closed`.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.accept_closed.store(true, Ordering::Release);
        self.done.notify_waiters();

        // Closed before joining, not after: a background loop that missed
        // `notify_waiters` (see `is_closed`) only re-checks the flag on its
        // next iteration, which for the dispatcher means its next
        // `read_packet`. Closing the transport manager first guarantees
        // that call returns `NotServing` immediately instead of the loop
        // waiting on a signal nobody will send again.
        self.transport_manager.close().await;

        let handles: Vec<JoinHandle<()>> = {
            let mut bg = self.background.lock().await;
            std::mem::take(&mut *bg)
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task did not shut down cleanly");
            }
        }

        {
            let mut state = self.state.lock().await;
            for group in state.route_groups.values() {
                group.close();
            }
            state.route_groups.clear();
        }

        info!("router closed");
    }
}

//! Route Dispatcher: the single loop that turns frames read off the
//! transport manager into forwards, consumes, closes or keep-alives.
//! Packet-level errors are never propagated upward — each is logged and
//! dropped, since silently tolerating loss is the correct behavior at this
//! layer. The loop itself exits only when the transport manager reports
//! `NotServing`.

use crate::error::RouterError;
use crate::packet::{Packet, PacketType};
use crate::router::Router;
use crate::rule::RuleKind;
use std::sync::Arc;
use tracing::{debug, warn};

pub async fn run(router: Arc<Router>) {
    loop {
        // `done.notify_waiters()` only wakes a waiter that is already
        // registered; a `close()` landing while this loop is inside
        // `dispatch_packet` (i.e. not currently parked in the `select!`
        // below) would otherwise be missed forever. This check bounds that
        // gap to one iteration.
        if router.is_closed() {
            debug!("router closed, dispatcher exiting");
            return;
        }
        tokio::select! {
            _ = router.done_signal().notified() => {
                debug!("dispatcher shutting down");
                return;
            }
            result = router.transport_manager().read_packet() => {
                match result {
                    Err(RouterError::NotServing) => {
                        debug!("transport manager stopped serving, dispatcher exiting");
                        return;
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to read packet, continuing");
                    }
                    Ok(pkt) => dispatch_packet(&router, pkt).await,
                }
            }
        }
    }
}

/// Dispatches one already-read frame. Exposed so tests (and anything
/// feeding packets in from a channel rather than `read_packet`) can drive
/// the forward/consume/close/keep-alive logic directly.
pub async fn dispatch_packet(router: &Arc<Router>, pkt: Packet) {
    match pkt.kind() {
        PacketType::Data => handle_data(router, pkt.route_id(), pkt.payload()).await,
        PacketType::Close => handle_close(router, pkt.route_id()).await,
        PacketType::KeepAlive => handle_keep_alive(router, pkt.route_id()).await,
    }
}

async fn handle_data(router: &Arc<Router>, route_id: u32, payload: &[u8]) {
    let rule = match router.table().rule(route_id) {
        Ok(rule) => rule,
        Err(e) => {
            warn!(route_id, error = %e, "dropping data packet, rule lookup failed");
            return;
        }
    };

    match rule.kind() {
        RuleKind::Forward | RuleKind::IntermediaryForward => {
            let next_route_id = rule.next_route_id().expect("forward rule carries next_route_id");
            let next_transport_id = rule
                .next_transport_id()
                .expect("forward rule carries next_transport_id");
            match router.transport_manager().transport(next_transport_id) {
                Some(transport) => {
                    let out = crate::packet::make_data_packet(next_route_id, payload);
                    if let Err(e) = transport.write_packet(out).await {
                        warn!(route_id, error = %e, "failed to forward data packet");
                    }
                }
                None => warn!(route_id, error = %RouterError::UnknownTransport, "dropping data packet"),
            }
        }
        RuleKind::Consume => {
            let desc = rule
                .route_descriptor()
                .expect("consume rule carries a route descriptor");
            match router.route_group(&desc).await {
                Some(group) if group.is_closing() => {
                    warn!(route_id, error = %RouterError::Closed, "dropping data packet, group closing");
                }
                Some(group) => {
                    if let Err(e) = group.enqueue(payload.to_vec()).await {
                        warn!(route_id, error = %e, "failed to enqueue data packet");
                    }
                }
                None => warn!(route_id, error = %RouterError::NoRouteGroup, "dropping data packet"),
            }
        }
    }
}

async fn handle_close(router: &Arc<Router>, route_id: u32) {
    let rule = match router.table().rule(route_id) {
        Ok(rule) => rule,
        Err(e) => {
            debug!(route_id, error = %e, "dropping close packet, rule lookup failed");
            return;
        }
    };

    if rule.kind() == RuleKind::Consume {
        if let Some(desc) = rule.route_descriptor()
            && let Some(group) = router.route_group(&desc).await
        {
            group.close();
        }
        router.table().del_rules(&[route_id]);
    } else {
        debug!(route_id, "close packet on a forwarding rule has no defined effect, dropping");
    }
}

async fn handle_keep_alive(router: &Arc<Router>, route_id: u32) {
    // Refreshes the rule regardless of kind: transit rules are exactly the
    // ones a hop-by-hop keep-alive exists to refresh.
    if let Err(e) = router.table().touch(route_id) {
        debug!(route_id, error = %e, "dropping keep-alive packet, rule lookup failed");
    }
}

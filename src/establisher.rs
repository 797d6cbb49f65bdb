//! Route Establisher: the `DialRoutes` orchestration. Queries the route
//! finder, hands the winning pair of paths to the setup-node dialogue, and
//! on success saves both rules and registers them against the caller's
//! route group. No partial state survives a failed call.

use crate::config::{DialOptions, HopLimits, ROUTE_FINDER_DEADLINE};
use crate::descriptor::{Port, PublicKey, RouteDescriptor};
use crate::error::{Result, RouterError};
use crate::route_finder::RouteOptions;
use crate::route_group::RouteGroup;
use crate::router::Router;
use crate::setup_client::BidirectionalRoute;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Delay between route-finder retries while the 10-second deadline hasn't
/// elapsed yet.
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

pub async fn dial_routes(
    router: &Arc<Router>,
    remote_pk: PublicKey,
    l_port: Port,
    r_port: Port,
    _opts: DialOptions,
    hop_limits: HopLimits,
) -> Result<Arc<RouteGroup>> {
    let local_pk = router.local_public_key();
    let forward_desc = RouteDescriptor::new(local_pk, remote_pk, l_port, r_port);
    let route_opts = RouteOptions {
        min_hops: hop_limits.min_hops,
        max_hops: hop_limits.max_hops,
    };

    let deadline = Instant::now() + ROUTE_FINDER_DEADLINE;
    let (forward_path, reverse_path) = loop {
        match router
            .route_finder()
            .find_routes((local_pk, remote_pk), (remote_pk, local_pk), route_opts)
            .await
        {
            Ok(paths) => break paths,
            Err(e) if Instant::now() < deadline => {
                warn!(error = %e, "route finder query failed, retrying");
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
            Err(e) => {
                warn!(error = %e, "route finder exhausted within deadline");
                return Err(RouterError::NoRoute);
            }
        }
    };

    let route = BidirectionalRoute {
        desc: forward_desc,
        keep_alive_ms: crate::config::DEFAULT_ROUTE_KEEP_ALIVE_MS,
        forward: forward_path,
        reverse: reverse_path,
    };

    let edge = router.setup_client().dial_route_group(route).await?;

    let forward_id = edge.forward.key_route_id();
    let reverse_id = edge.reverse.key_route_id();
    router.table().save_rule(edge.forward.clone())?;
    if let Err(e) = router.table().save_rule(edge.reverse.clone()) {
        router.table().del_rules(&[forward_id]);
        return Err(e);
    }

    let next_transport_id = match edge.forward.next_transport_id() {
        Some(id) => id,
        None => {
            router.table().del_rules(&[forward_id, reverse_id]);
            return Err(RouterError::NoTransport);
        }
    };
    let transport = match router.transport_manager().transport(next_transport_id) {
        Some(t) => t,
        None => {
            router.table().del_rules(&[forward_id, reverse_id]);
            return Err(RouterError::UnknownTransport);
        }
    };

    let group = router.get_or_create_route_group(edge.desc).await;
    group
        .append_edge(edge.forward, edge.reverse, transport)
        .await;
    info!(descriptor = ?edge.desc, "dialed route group");
    Ok(group)
}

//! The setup client: an out-of-band dialogue with a trusted setup node,
//! external to this crate. `DialRoutes` makes exactly one round trip
//! through this trait per call.

use crate::descriptor::RouteDescriptor;
use crate::error::Result;
use crate::route_finder::Path;
use crate::rule::Rule;

#[derive(Debug, Clone)]
pub struct BidirectionalRoute {
    pub desc: RouteDescriptor,
    pub keep_alive_ms: i64,
    pub forward: Path,
    pub reverse: Path,
}

/// The `(forward, reverse)` pair a setup node installs for one session edge.
#[derive(Debug, Clone)]
pub struct EdgeRules {
    pub desc: RouteDescriptor,
    pub forward: Rule,
    pub reverse: Rule,
}

#[tonic::async_trait]
pub trait SetupClient: Send + Sync {
    async fn dial_route_group(&self, route: BidirectionalRoute) -> Result<EdgeRules>;
}

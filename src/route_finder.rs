//! The route-finder client: an external collaborator reached over HTTPS in
//! production. The core only consumes this trait; `DialRoutes` retries on
//! transient failures until its deadline elapses.

use crate::descriptor::PublicKey;
use crate::error::Result;
use crate::rule::TransportId;

#[derive(Debug, Clone, Copy)]
pub struct RouteOptions {
    pub min_hops: u8,
    pub max_hops: u8,
}

impl Default for RouteOptions {
    fn default() -> Self {
        RouteOptions {
            min_hops: 0,
            max_hops: 50,
        }
    }
}

/// A candidate path: the ordered transports a packet crosses en route.
#[derive(Debug, Clone)]
pub struct Path {
    pub hops: Vec<TransportId>,
}

#[tonic::async_trait]
pub trait RouteFinder: Send + Sync {
    /// Resolves the best candidate path for each direction. Any `Err` is
    /// treated as transient by the establisher and retried until its
    /// deadline; there is no separate "permanent failure" signal at this
    /// layer.
    async fn find_routes(
        &self,
        forward_edge: (PublicKey, PublicKey),
        backward_edge: (PublicKey, PublicKey),
        opts: RouteOptions,
    ) -> Result<(Path, Path)>;
}

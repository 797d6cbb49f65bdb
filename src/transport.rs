//! The transport manager and the individual transports it surfaces are
//! external collaborators (`snet`, in overlay terms): this crate only
//! consumes the interface, never the implementation. Production wiring of
//! real authenticated byte-stream transports lives outside this crate; what
//! follows is the consumed contract plus the in-memory mock used by tests.

use crate::error::Result;
use crate::packet::Packet;
use crate::rule::TransportId;
use std::sync::Arc;

/// One authenticated bidirectional byte stream between adjacent visors,
/// already framed into packets.
#[tonic::async_trait]
pub trait Transport: Send + Sync {
    fn id(&self) -> TransportId;
    async fn write_packet(&self, pkt: Packet) -> Result<()>;
}

/// Maintains the pool of transports and surfaces framed reads across all of
/// them. `read_packet` returning `NotServing` is the dispatcher's shutdown
/// signal.
#[tonic::async_trait]
pub trait TransportManager: Send + Sync {
    async fn read_packet(&self) -> Result<Packet>;
    fn transport(&self, id: TransportId) -> Option<Arc<dyn Transport>>;
    /// Blocks until the manager stops serving (shutdown). `Router::serve`
    /// awaits this directly.
    async fn serve(&self) -> Result<()>;
    async fn close(&self);
}

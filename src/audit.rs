//! Control-plane audit trail. The router has no persisted state and ships
//! no separate log-replication service, so unlike the wider product this
//! emits structured `tracing` events at the `audit` target rather than
//! shipping to an external log sink; anything downstream that wants a
//! durable trail subscribes to that target.

use crate::descriptor::{PublicKey, RouteDescriptor};
use tracing::info;

pub struct AuditLog;

impl AuditLog {
    pub fn rules_added(caller: PublicKey, route_ids: &[u32]) {
        info!(target: "audit", %caller, ?route_ids, "rules added");
    }

    pub fn rules_deleted(caller: PublicKey, route_ids: &[u32]) {
        info!(target: "audit", %caller, ?route_ids, "rules deleted");
    }

    pub fn keys_reserved(caller: PublicKey, count: usize) {
        info!(target: "audit", %caller, count, "route ids reserved");
    }

    pub fn edge_introduced(caller: PublicKey, desc: &RouteDescriptor) {
        info!(target: "audit", %caller, ?desc, "edge introduced");
    }

    pub fn untrusted_caller_rejected(caller: PublicKey) {
        info!(target: "audit", %caller, "rejected setup connection from untrusted caller");
    }
}

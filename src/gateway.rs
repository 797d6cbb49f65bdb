//! Setup RPC Gateway: the inbound control surface for trusted setup nodes.
//! Transport-agnostic on purpose — `grpc::service` adapts this to tonic,
//! tests drive it directly. Authorization is binary and happens before any
//! of the four methods run; an untrusted caller never touches the table.

use crate::descriptor::{PublicKey, RouteId};
use crate::error::{Result, RouterError};
use crate::router::Router;
use crate::rule::Rule;
use crate::setup_client::EdgeRules;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub enum SetupRequest {
    AddRules(Vec<Rule>),
    DeleteRules(Vec<RouteId>),
    ReserveIds(usize),
    IntroduceRules(EdgeRules),
}

#[derive(Debug)]
pub enum SetupReply {
    RouteIds(Vec<RouteId>),
    Ack,
}

/// Handles exactly one request from `caller`. Callers not in the trusted
/// set never reach the match below.
pub async fn handle_request(
    router: &Arc<Router>,
    caller: PublicKey,
    request: SetupRequest,
) -> Result<SetupReply> {
    if !router.setup_is_trusted(caller) {
        crate::audit::AuditLog::untrusted_caller_rejected(caller);
        return Err(RouterError::Untrusted);
    }

    match request {
        SetupRequest::AddRules(rules) => {
            let mut ids = Vec::with_capacity(rules.len());
            for rule in rules {
                ids.push(router.table().save_rule(rule)?);
            }
            crate::audit::AuditLog::rules_added(caller, &ids);
            Ok(SetupReply::RouteIds(ids))
        }
        SetupRequest::DeleteRules(ids) => {
            router.table().del_rules(&ids);
            crate::audit::AuditLog::rules_deleted(caller, &ids);
            Ok(SetupReply::RouteIds(ids))
        }
        SetupRequest::ReserveIds(n) => {
            let ids = router.table().reserve_keys(n)?;
            crate::audit::AuditLog::keys_reserved(caller, ids.len());
            Ok(SetupReply::RouteIds(ids))
        }
        SetupRequest::IntroduceRules(edge) => {
            info!(descriptor = ?edge.desc, "introducing edge rules");
            crate::audit::AuditLog::edge_introduced(caller, &edge.desc);
            router.introduce_rules(edge).await?;
            Ok(SetupReply::Ack)
        }
    }
}

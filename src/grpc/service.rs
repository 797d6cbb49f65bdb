//! tonic adapter for the Setup RPC Gateway. Translates wire messages into
//! `gateway::SetupRequest`/`SetupReply` and runs them through
//! `gateway::handle_request`; the actual authorization and dispatch logic
//! lives in `gateway`, not here.

use super::proto::setup_service_server::SetupService;
use super::proto::{
    AddRulesReply, AddRulesRequest, DeleteRulesReply, DeleteRulesRequest, EdgeRulesProto,
    IntroduceRulesReply, IntroduceRulesRequest, ReserveIdsReply, ReserveIdsRequest,
    RouteDescriptorProto,
};
use crate::descriptor::{PublicKey, RouteDescriptor};
use crate::error::RouterError;
use crate::gateway::{self, SetupReply, SetupRequest};
use crate::router::Router;
use crate::rule::Rule;
use crate::setup_client::EdgeRules;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::warn;

/// Metadata key carrying the caller's public key. In production this is
/// populated by the authenticated `snet` session the RPC gateway sits
/// above; tonic itself has no notion of it.
const CALLER_KEY_HEADER: &str = "x-visor-pubkey";

pub struct SetupServiceImpl {
    router: Arc<Router>,
}

impl SetupServiceImpl {
    pub fn new(router: Arc<Router>) -> Self {
        SetupServiceImpl { router }
    }
}

fn router_err_to_status(err: RouterError) -> Status {
    match err {
        RouterError::Untrusted => Status::permission_denied(err.to_string()),
        RouterError::Corrupted => Status::invalid_argument(err.to_string()),
        RouterError::TableFull => Status::resource_exhausted(err.to_string()),
        RouterError::Closed => Status::failed_precondition(err.to_string()),
        RouterError::NotFound | RouterError::Expired => Status::not_found(err.to_string()),
        other => Status::internal(other.to_string()),
    }
}

fn caller_pk(request: &Request<impl Sized>) -> Result<PublicKey, Status> {
    let raw = request
        .metadata()
        .get(CALLER_KEY_HEADER)
        .ok_or_else(|| Status::unauthenticated("missing caller public key"))?;
    let hex = raw
        .to_str()
        .map_err(|_| Status::unauthenticated("malformed caller public key"))?;
    let bytes = hex_to_bytes(hex).ok_or_else(|| Status::unauthenticated("malformed caller public key"))?;
    Ok(PublicKey::from_bytes(bytes))
}

fn hex_to_bytes(hex: &str) -> Option<[u8; 32]> {
    if hex.len() != 64 {
        return None;
    }
    let mut out = [0u8; 32];
    for (i, chunk) in out.iter_mut().enumerate() {
        *chunk = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(out)
}

fn proto_to_route_descriptor(proto: RouteDescriptorProto) -> Result<RouteDescriptor, Status> {
    let src_pk = bytes_to_pk(&proto.src_pk)?;
    let dst_pk = bytes_to_pk(&proto.dst_pk)?;
    Ok(RouteDescriptor::new(
        src_pk,
        dst_pk,
        proto.src_port as u16,
        proto.dst_port as u16,
    ))
}

fn bytes_to_pk(bytes: &[u8]) -> Result<PublicKey, Status> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Status::invalid_argument("public key must be 32 bytes"))?;
    Ok(PublicKey::from_bytes(arr))
}

fn proto_to_edge_rules(proto: EdgeRulesProto) -> Result<EdgeRules, Status> {
    let desc_proto = proto
        .desc
        .ok_or_else(|| Status::invalid_argument("edge rules missing descriptor"))?;
    let desc = proto_to_route_descriptor(desc_proto)?;
    let forward = Rule::parse(&proto.forward).map_err(router_err_to_status)?;
    let reverse = Rule::parse(&proto.reverse).map_err(router_err_to_status)?;
    Ok(EdgeRules {
        desc,
        forward,
        reverse,
    })
}

#[tonic::async_trait]
impl SetupService for SetupServiceImpl {
    async fn add_rules(
        &self,
        request: Request<AddRulesRequest>,
    ) -> Result<Response<AddRulesReply>, Status> {
        let caller = caller_pk(&request)?;
        let body = request.into_inner();
        let rules: Result<Vec<Rule>, Status> = body
            .rules
            .iter()
            .map(|raw| Rule::parse(raw).map_err(router_err_to_status))
            .collect();
        let rules = rules?;

        match gateway::handle_request(&self.router, caller, SetupRequest::AddRules(rules)).await {
            Ok(SetupReply::RouteIds(ids)) => Ok(Response::new(AddRulesReply { route_ids: ids })),
            Ok(_) => unreachable!("add_rules always replies with route ids"),
            Err(e) => Err(router_err_to_status(e)),
        }
    }

    async fn delete_rules(
        &self,
        request: Request<DeleteRulesRequest>,
    ) -> Result<Response<DeleteRulesReply>, Status> {
        let caller = caller_pk(&request)?;
        let body = request.into_inner();

        match gateway::handle_request(&self.router, caller, SetupRequest::DeleteRules(body.route_ids))
            .await
        {
            Ok(SetupReply::RouteIds(ids)) => Ok(Response::new(DeleteRulesReply { route_ids: ids })),
            Ok(_) => unreachable!("delete_rules always replies with route ids"),
            Err(e) => Err(router_err_to_status(e)),
        }
    }

    async fn reserve_ids(
        &self,
        request: Request<ReserveIdsRequest>,
    ) -> Result<Response<ReserveIdsReply>, Status> {
        let caller = caller_pk(&request)?;
        let body = request.into_inner();

        match gateway::handle_request(
            &self.router,
            caller,
            SetupRequest::ReserveIds(body.count as usize),
        )
        .await
        {
            Ok(SetupReply::RouteIds(ids)) => Ok(Response::new(ReserveIdsReply { route_ids: ids })),
            Ok(_) => unreachable!("reserve_ids always replies with route ids"),
            Err(e) => Err(router_err_to_status(e)),
        }
    }

    async fn introduce_rules(
        &self,
        request: Request<IntroduceRulesRequest>,
    ) -> Result<Response<IntroduceRulesReply>, Status> {
        let caller = caller_pk(&request)?;
        let body = request.into_inner();
        let edge_proto = body
            .edge
            .ok_or_else(|| Status::invalid_argument("missing edge"))?;
        let edge = proto_to_edge_rules(edge_proto)?;

        match gateway::handle_request(&self.router, caller, SetupRequest::IntroduceRules(edge)).await
        {
            Ok(SetupReply::Ack) => Ok(Response::new(IntroduceRulesReply {})),
            Ok(_) => unreachable!("introduce_rules always acks"),
            Err(e) => {
                warn!(error = %e, "introduce_rules failed");
                Err(router_err_to_status(e))
            }
        }
    }
}

//! End-to-end scenarios driving the router facade the way the original
//! two-visor test fixture did: wire a pair of mock transports together,
//! dispatch frames directly, and watch rules/route groups react.

use mesh_router::config::RouterConfig;
use mesh_router::descriptor::{PublicKey, RouteDescriptor, SecretKey};
use mesh_router::dispatcher::dispatch_packet;
use mesh_router::error::RouterError;
use mesh_router::gateway::{SetupReply, SetupRequest, handle_request};
use mesh_router::packet::make_data_packet;
use mesh_router::router::Router;
use mesh_router::rule::Rule;
use mesh_router::table::RoutingTable;
use mesh_router::test_util::{MockRouteFinder, MockSetupClient, MockTransportManager, gen_public_key};
use mesh_router::transport::TransportManager;
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

fn listen_addr() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn test_router(tm: Arc<MockTransportManager>) -> Arc<Router> {
    let config = RouterConfig::new(
        gen_public_key(),
        SecretKey([0u8; 32]),
        vec![],
        listen_addr(),
    );
    Router::new(
        config,
        RoutingTable::new(),
        tm,
        Arc::new(MockRouteFinder::empty()),
        Arc::new(MockSetupClient::failing()),
    )
}

#[tokio::test]
async fn forward_rule_hands_packet_to_the_next_transport() {
    let (tm_a, tm_b, transport_id) = MockTransportManager::connect_pair();
    let r0 = test_router(tm_a);

    let remote_pk = gen_public_key();
    let rule = Rule::forward(3_600_000, 9, 5, transport_id, remote_pk, 11, 22);
    r0.save_routing_rules(vec![rule]).unwrap();

    let incoming = make_data_packet(9, b"This is a test!");
    dispatch_packet(&r0, incoming.clone()).await;

    let forwarded = tm_b.read_packet().await.unwrap();
    assert_eq!(forwarded.route_id(), 5);
    assert_eq!(forwarded.payload(), b"This is a test!");
    assert_eq!(forwarded.size(), incoming.size());
}

#[tokio::test]
async fn intermediary_forward_rule_hands_packet_to_the_next_transport() {
    let (tm_a, tm_b, transport_id) = MockTransportManager::connect_pair();
    let r0 = test_router(tm_a);

    let rule = Rule::intermediary_forward(3_600_000, 9, 5, transport_id);
    r0.save_routing_rules(vec![rule]).unwrap();

    let incoming = make_data_packet(9, b"relay me");
    dispatch_packet(&r0, incoming.clone()).await;

    let forwarded = tm_b.read_packet().await.unwrap();
    assert_eq!(forwarded.route_id(), 5);
    assert_eq!(forwarded.payload(), b"relay me");
    assert_eq!(forwarded.size(), incoming.size());
}

#[tokio::test]
async fn forward_to_unknown_transport_is_dropped_without_panicking() {
    let tm = Arc::new(MockTransportManager::new());
    let r0 = test_router(tm);

    let rule = Rule::intermediary_forward(3_600_000, 9, 5, Uuid::new_v4());
    r0.save_routing_rules(vec![rule]).unwrap();

    dispatch_packet(&r0, make_data_packet(9, b"nowhere")).await;
    assert!(r0.rule(9).is_ok());
}

#[tokio::test]
async fn expired_rule_is_not_forwarded() {
    let (tm_a, _tm_b, transport_id) = MockTransportManager::connect_pair();
    let r0 = test_router(tm_a);

    let rule = Rule::intermediary_forward(-1, 9, 5, transport_id);
    r0.save_routing_rules(vec![rule]).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(1));

    dispatch_packet(&r0, make_data_packet(9, b"too late")).await;
    assert_eq!(r0.rule(9).unwrap_err(), RouterError::Expired);
}

#[tokio::test]
async fn remove_route_descriptor_deletes_only_the_exact_match() {
    let tm = Arc::new(MockTransportManager::new());
    let r0 = test_router(tm);

    let remote_pk = gen_public_key();
    let desc = RouteDescriptor::new(PublicKey::zero(), remote_pk, 11, 22);
    let other_desc = RouteDescriptor::new(PublicKey::zero(), remote_pk, 33, 44);

    let id = r0.reserve_keys(1).unwrap()[0];
    let rule = Rule::consume(3_600_000, id, remote_pk, 11, 22);
    r0.save_routing_rules(vec![rule]).unwrap();
    assert_eq!(r0.rule_count(), 1);

    r0.remove_route_descriptor(other_desc);
    assert_eq!(r0.rule_count(), 1, "non-matching descriptor must not delete anything");

    r0.remove_route_descriptor(desc);
    assert_eq!(r0.rule_count(), 0);
}

#[tokio::test]
async fn setup_gateway_add_reserve_delete_cycle() {
    let tm = Arc::new(MockTransportManager::new());
    let trusted = gen_public_key();
    let config = RouterConfig::new(gen_public_key(), SecretKey([0u8; 32]), vec![trusted], listen_addr());
    let r0 = Router::new(
        config,
        RoutingTable::new(),
        tm,
        Arc::new(MockRouteFinder::empty()),
        Arc::new(MockSetupClient::failing()),
    );

    let reserved = match handle_request(&r0, trusted, SetupRequest::ReserveIds(1))
        .await
        .unwrap()
    {
        SetupReply::RouteIds(ids) => ids,
        other => panic!("unexpected reply: {other:?}"),
    };
    assert_eq!(reserved.len(), 1);
    let id = reserved[0];

    let rule = Rule::intermediary_forward(3_600_000, id, 5, Uuid::new_v4());
    let saved_ids = match handle_request(&r0, trusted, SetupRequest::AddRules(vec![rule.clone()]))
        .await
        .unwrap()
    {
        SetupReply::RouteIds(ids) => ids,
        other => panic!("unexpected reply: {other:?}"),
    };
    assert_eq!(saved_ids, vec![id]);
    assert_eq!(r0.rule_count(), 1);
    assert_eq!(r0.rule(id).unwrap(), rule);

    handle_request(&r0, trusted, SetupRequest::DeleteRules(vec![id]))
        .await
        .unwrap();
    assert_eq!(r0.rule_count(), 0);
    assert_eq!(r0.rule(id).unwrap_err(), RouterError::NotFound);
}

#[tokio::test]
async fn untrusted_caller_is_rejected_and_table_is_untouched() {
    let tm = Arc::new(MockTransportManager::new());
    let trusted = gen_public_key();
    let untrusted = gen_public_key();
    let config = RouterConfig::new(gen_public_key(), SecretKey([0u8; 32]), vec![trusted], listen_addr());
    let r0 = Router::new(
        config,
        RoutingTable::new(),
        tm,
        Arc::new(MockRouteFinder::empty()),
        Arc::new(MockSetupClient::failing()),
    );

    let err = handle_request(&r0, untrusted, SetupRequest::ReserveIds(3))
        .await
        .unwrap_err();
    assert_eq!(err, RouterError::Untrusted);
    assert_eq!(r0.rule_count(), 0);
}

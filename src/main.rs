use clap::Parser;
use mesh_router::config::RouterConfig;
use mesh_router::descriptor::{PublicKey, SecretKey};
use mesh_router::grpc::proto::setup_service_server::SetupServiceServer;
use mesh_router::grpc::SetupServiceImpl;
use mesh_router::router::Router;
use mesh_router::table::RoutingTable;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tonic::transport::Server;
use tracing::{error, info};

/// Default setup-RPC listen address.
const SETUP_ADDR: &str = "[::1]:50060";

#[derive(Parser, Debug)]
#[command(about = "Mesh-overlay packet router")]
struct Args {
    /// Address the setup RPC gateway listens on.
    #[arg(long, default_value = SETUP_ADDR)]
    setup_addr: String,

    /// Hex-encoded 32-byte trusted setup node public key. May be repeated.
    #[arg(long = "trusted-setup-node")]
    trusted_setup_nodes: Vec<String>,
}

fn parse_pk_hex(hex: &str) -> anyhow::Result<PublicKey> {
    if hex.len() != 64 {
        anyhow::bail!("public key must be 64 hex characters");
    }
    let mut bytes = [0u8; 32];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)?;
    }
    Ok(PublicKey::from_bytes(bytes))
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let trusted_setup_nodes: Vec<PublicKey> = match args
        .trusted_setup_nodes
        .iter()
        .map(|s| parse_pk_hex(s))
        .collect()
    {
        Ok(keys) => keys,
        Err(e) => {
            error!(error = %e, "invalid --trusted-setup-node");
            std::process::exit(1);
        }
    };

    let setup_addr = match args.setup_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, "invalid --setup-addr");
            std::process::exit(1);
        }
    };

    // Real `snet`/route-finder/setup-client implementations are external
    // glue this crate only consumes through a trait (see transport.rs,
    // route_finder.rs, setup_client.rs). The in-memory ones stand in here
    // so the binary demonstrates the router's own lifecycle end to end.
    let local_pk = PublicKey::from_bytes(rand_bytes());
    let local_sk = SecretKey(rand_bytes());
    let config = RouterConfig::new(local_pk, local_sk, trusted_setup_nodes, setup_addr);

    info!(local_pk = %local_pk, "starting mesh router");

    let table = RoutingTable::new();
    let transport_manager = Arc::new(mesh_router::test_util::MockTransportManager::new());
    let route_finder = Arc::new(mesh_router::test_util::MockRouteFinder::empty());
    let setup_client = Arc::new(mesh_router::test_util::MockSetupClient::failing());

    let router = Router::new(config, table, transport_manager, route_finder, setup_client);

    let grpc_router = Arc::clone(&router);
    let grpc_service = SetupServiceImpl::new(grpc_router);

    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    let grpc_server = Server::builder()
        .add_service(SetupServiceServer::new(grpc_service))
        .serve_with_shutdown(setup_addr, async {
            tokio::select! {
                _ = sigint.recv() => info!("received SIGINT"),
                _ = sigterm.recv() => info!("received SIGTERM"),
            }
        });

    let router_for_serve = Arc::clone(&router);
    let serve_result = tokio::select! {
        result = router_for_serve.serve() => result,
        result = grpc_server => {
            if let Err(e) = result {
                error!(error = %e, "setup RPC server error");
            }
            router.close().await;
            Ok(())
        }
    };

    if let Err(e) = serve_result {
        error!(error = %e, "router serve loop exited with error");
    }

    info!("mesh router stopped");
}

fn rand_bytes() -> [u8; 32] {
    let mut out = [0u8; 32];
    let uuid_bytes = uuid::Uuid::new_v4();
    out[..16].copy_from_slice(uuid_bytes.as_bytes());
    let uuid_bytes2 = uuid::Uuid::new_v4();
    out[16..].copy_from_slice(uuid_bytes2.as_bytes());
    out
}

//! Wire transport for the Setup RPC Gateway, built on tonic.

pub mod service;

pub mod proto {
    tonic::include_proto!("mesh.setup");
}

pub use service::SetupServiceImpl;

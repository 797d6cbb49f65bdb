pub mod audit;
pub mod config;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod establisher;
pub mod gateway;
pub mod grpc;
pub mod packet;
pub mod route_finder;
pub mod route_group;
pub mod router;
pub mod rule;
pub mod setup_client;
pub mod table;
pub mod test_util;
pub mod transport;

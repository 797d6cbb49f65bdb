//! Error taxonomy shared across the routing table, route groups and the
//! router facade. Variants map 1:1 onto the kinds the dispatcher and the
//! control surface are allowed to produce; adding a new failure mode means
//! adding a variant here first.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("route id not found")]
    NotFound,

    #[error("rule expired")]
    Expired,

    #[error("rule is corrupted")]
    Corrupted,

    #[error("forward target transport is unknown")]
    UnknownTransport,

    #[error("no route group for descriptor")]
    NoRouteGroup,

    #[error("operation on closed entity")]
    Closed,

    #[error("operation cancelled")]
    Cancelled,

    #[error("route finder exhausted within deadline")]
    NoRoute,

    #[error("setup dialogue failed: {0}")]
    SetupFailed(String),

    #[error("setup caller is not trusted")]
    Untrusted,

    #[error("routing table is full")]
    TableFull,

    #[error("transport manager is not serving")]
    NotServing,

    #[error("route group has no bound transport")]
    NoTransport,
}

pub type Result<T> = std::result::Result<T, RouterError>;

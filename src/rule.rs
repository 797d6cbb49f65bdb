//! Routing rules: an opaque byte-encoded record with a parsed view.
//!
//! Wire layout is a common header followed by a variant-specific body. The
//! header alone must be present for a rule to be considered well-formed;
//! anything shorter is `Corrupted`.
//!
//! ```text
//! byte 0        : kind (0=Forward, 1=IntermediaryForward, 2=Consume)
//! bytes 1..9    : keep_alive, i64 milliseconds, little-endian (may be negative)
//! bytes 9..13   : keyRouteID, u32 little-endian
//! bytes 13..    : variant body
//! ```

use crate::descriptor::{PublicKey, RouteDescriptor, RouteId};
use crate::error::{Result, RouterError};
use uuid::Uuid;

pub const HEADER_SIZE: usize = 13;

pub type TransportId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Forward,
    IntermediaryForward,
    Consume,
}

impl RuleKind {
    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(RuleKind::Forward),
            1 => Ok(RuleKind::IntermediaryForward),
            2 => Ok(RuleKind::Consume),
            _ => Err(RouterError::Corrupted),
        }
    }

    fn tag(self) -> u8 {
        match self {
            RuleKind::Forward => 0,
            RuleKind::IntermediaryForward => 1,
            RuleKind::Consume => 2,
        }
    }
}

/// A parsed routing rule. Holds the raw bytes alongside the decoded fields
/// so `raw()` can be handed straight to the wire without re-encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    raw: Vec<u8>,
    kind: RuleKind,
    keep_alive_ms: i64,
    key_route_id: RouteId,
    next_route_id: Option<RouteId>,
    next_transport_id: Option<TransportId>,
    route_descriptor: Option<RouteDescriptor>,
}

impl Rule {
    pub fn forward(
        keep_alive_ms: i64,
        key_route_id: RouteId,
        next_route_id: RouteId,
        next_transport_id: TransportId,
        remote_pk: PublicKey,
        src_port: u16,
        dst_port: u16,
    ) -> Self {
        let mut raw = Vec::with_capacity(HEADER_SIZE + 56);
        write_header(&mut raw, RuleKind::Forward, keep_alive_ms, key_route_id);
        raw.extend_from_slice(&next_route_id.to_le_bytes());
        raw.extend_from_slice(next_transport_id.as_bytes());
        raw.extend_from_slice(&remote_pk.0);
        raw.extend_from_slice(&src_port.to_le_bytes());
        raw.extend_from_slice(&dst_port.to_le_bytes());
        let route_descriptor = Some(RouteDescriptor::new(
            PublicKey::zero(),
            remote_pk,
            src_port,
            dst_port,
        ));
        Rule {
            raw,
            kind: RuleKind::Forward,
            keep_alive_ms,
            key_route_id,
            next_route_id: Some(next_route_id),
            next_transport_id: Some(next_transport_id),
            route_descriptor,
        }
    }

    pub fn intermediary_forward(
        keep_alive_ms: i64,
        key_route_id: RouteId,
        next_route_id: RouteId,
        next_transport_id: TransportId,
    ) -> Self {
        let mut raw = Vec::with_capacity(HEADER_SIZE + 20);
        write_header(
            &mut raw,
            RuleKind::IntermediaryForward,
            keep_alive_ms,
            key_route_id,
        );
        raw.extend_from_slice(&next_route_id.to_le_bytes());
        raw.extend_from_slice(next_transport_id.as_bytes());
        Rule {
            raw,
            kind: RuleKind::IntermediaryForward,
            keep_alive_ms,
            key_route_id,
            next_route_id: Some(next_route_id),
            next_transport_id: Some(next_transport_id),
            route_descriptor: None,
        }
    }

    pub fn consume(
        keep_alive_ms: i64,
        key_route_id: RouteId,
        remote_pk: PublicKey,
        src_port: u16,
        dst_port: u16,
    ) -> Self {
        let mut raw = Vec::with_capacity(HEADER_SIZE + 36);
        write_header(&mut raw, RuleKind::Consume, keep_alive_ms, key_route_id);
        raw.extend_from_slice(&remote_pk.0);
        raw.extend_from_slice(&src_port.to_le_bytes());
        raw.extend_from_slice(&dst_port.to_le_bytes());
        let route_descriptor = Some(RouteDescriptor::new(
            PublicKey::zero(),
            remote_pk,
            src_port,
            dst_port,
        ));
        Rule {
            raw,
            kind: RuleKind::Consume,
            keep_alive_ms,
            key_route_id,
            next_route_id: None,
            next_transport_id: None,
            route_descriptor,
        }
    }

    /// Parses a rule from its wire bytes. Fails `Corrupted` if shorter than
    /// the header or the variant body, or if the kind tag is unrecognized.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < HEADER_SIZE {
            return Err(RouterError::Corrupted);
        }
        let kind = RuleKind::from_tag(raw[0])?;
        let keep_alive_ms = i64::from_le_bytes(raw[1..9].try_into().unwrap());
        let key_route_id = u32::from_le_bytes(raw[9..13].try_into().unwrap());
        let body = &raw[HEADER_SIZE..];

        let (next_route_id, next_transport_id, route_descriptor) = match kind {
            RuleKind::Forward => {
                if body.len() < 56 {
                    return Err(RouterError::Corrupted);
                }
                let next_route_id = u32::from_le_bytes(body[0..4].try_into().unwrap());
                let next_transport_id = Uuid::from_slice(&body[4..20]).unwrap();
                let mut remote_pk = [0u8; 32];
                remote_pk.copy_from_slice(&body[20..52]);
                let src_port = u16::from_le_bytes(body[52..54].try_into().unwrap());
                let dst_port = u16::from_le_bytes(body[54..56].try_into().unwrap());
                let desc = RouteDescriptor::new(
                    PublicKey::zero(),
                    PublicKey::from_bytes(remote_pk),
                    src_port,
                    dst_port,
                );
                (Some(next_route_id), Some(next_transport_id), Some(desc))
            }
            RuleKind::IntermediaryForward => {
                if body.len() < 20 {
                    return Err(RouterError::Corrupted);
                }
                let next_route_id = u32::from_le_bytes(body[0..4].try_into().unwrap());
                let next_transport_id = Uuid::from_slice(&body[4..20]).unwrap();
                (Some(next_route_id), Some(next_transport_id), None)
            }
            RuleKind::Consume => {
                if body.len() < 36 {
                    return Err(RouterError::Corrupted);
                }
                let mut remote_pk = [0u8; 32];
                remote_pk.copy_from_slice(&body[0..32]);
                let src_port = u16::from_le_bytes(body[32..34].try_into().unwrap());
                let dst_port = u16::from_le_bytes(body[34..36].try_into().unwrap());
                let desc = RouteDescriptor::new(
                    PublicKey::zero(),
                    PublicKey::from_bytes(remote_pk),
                    src_port,
                    dst_port,
                );
                (None, None, Some(desc))
            }
        };

        Ok(Rule {
            raw: raw.to_vec(),
            kind,
            keep_alive_ms,
            key_route_id,
            next_route_id,
            next_transport_id,
            route_descriptor,
        })
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn key_route_id(&self) -> RouteId {
        self.key_route_id
    }

    pub fn next_route_id(&self) -> Option<RouteId> {
        self.next_route_id
    }

    pub fn next_transport_id(&self) -> Option<TransportId> {
        self.next_transport_id
    }

    pub fn route_descriptor(&self) -> Option<RouteDescriptor> {
        self.route_descriptor
    }

    pub fn keep_alive_ms(&self) -> i64 {
        self.keep_alive_ms
    }

    pub fn is_consume(&self) -> bool {
        self.kind == RuleKind::Consume
    }

    pub fn is_forward_like(&self) -> bool {
        matches!(self.kind, RuleKind::Forward | RuleKind::IntermediaryForward)
    }
}

fn write_header(buf: &mut Vec<u8>, kind: RuleKind, keep_alive_ms: i64, key_route_id: RouteId) {
    buf.push(kind.tag());
    buf.extend_from_slice(&keep_alive_ms.to_le_bytes());
    buf.extend_from_slice(&key_route_id.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_rule_round_trips() {
        let rule = Rule::forward(
            3_600_000,
            7,
            5,
            Uuid::new_v4(),
            PublicKey::from_bytes([9u8; 32]),
            1,
            2,
        );
        let parsed = Rule::parse(rule.raw()).unwrap();
        assert_eq!(parsed.kind(), RuleKind::Forward);
        assert_eq!(parsed.key_route_id(), 7);
        assert_eq!(parsed.next_route_id(), Some(5));
    }

    #[test]
    fn short_rule_is_corrupted() {
        let err = Rule::parse(&[0u8; HEADER_SIZE - 1]).unwrap_err();
        assert_eq!(err, RouterError::Corrupted);
    }

    #[test]
    fn unknown_kind_tag_is_corrupted() {
        let mut raw = vec![0u8; HEADER_SIZE];
        raw[0] = 0xff;
        assert_eq!(Rule::parse(&raw).unwrap_err(), RouterError::Corrupted);
    }
}

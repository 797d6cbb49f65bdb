//! Wire frame carried over a transport: `{type, routeID, payloadLen, payload}`.
//! `make_data_packet` is the canonical producer; `Packet::parse` the
//! canonical consumer. Layout is private to this module — callers only see
//! `Size()`/`Type()`/`RouteID()`/`Payload()`.

use crate::descriptor::RouteId;
use crate::error::{Result, RouterError};

const FRAME_HEADER_SIZE: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Data,
    Close,
    KeepAlive,
}

impl PacketType {
    fn tag(self) -> u8 {
        match self {
            PacketType::Data => 0,
            PacketType::Close => 1,
            PacketType::KeepAlive => 2,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(PacketType::Data),
            1 => Some(PacketType::Close),
            2 => Some(PacketType::KeepAlive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    raw: Vec<u8>,
    kind: PacketType,
    route_id: RouteId,
    payload_len: u32,
}

impl Packet {
    pub fn size(&self) -> usize {
        self.raw.len()
    }

    pub fn kind(&self) -> PacketType {
        self.kind
    }

    pub fn route_id(&self) -> RouteId {
        self.route_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.raw[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + self.payload_len as usize]
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < FRAME_HEADER_SIZE {
            return Err(RouterError::Corrupted);
        }
        let kind = PacketType::from_tag(raw[0]).ok_or(RouterError::Corrupted)?;
        let route_id = u32::from_le_bytes(raw[1..5].try_into().unwrap());
        let payload_len = u32::from_le_bytes(raw[5..9].try_into().unwrap());
        if raw.len() < FRAME_HEADER_SIZE + payload_len as usize {
            return Err(RouterError::Corrupted);
        }
        Ok(Packet {
            raw: raw.to_vec(),
            kind,
            route_id,
            payload_len,
        })
    }

    fn build(kind: PacketType, route_id: RouteId, payload: &[u8]) -> Self {
        let mut raw = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        raw.push(kind.tag());
        raw.extend_from_slice(&route_id.to_le_bytes());
        raw.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        raw.extend_from_slice(payload);
        Packet {
            raw,
            kind,
            route_id,
            payload_len: payload.len() as u32,
        }
    }
}

pub fn make_data_packet(route_id: RouteId, payload: &[u8]) -> Packet {
    Packet::build(PacketType::Data, route_id, payload)
}

pub fn make_close_packet(route_id: RouteId) -> Packet {
    Packet::build(PacketType::Close, route_id, &[])
}

pub fn make_keep_alive_packet(route_id: RouteId) -> Packet {
    Packet::build(PacketType::KeepAlive, route_id, &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_packet_round_trips() {
        let pkt = make_data_packet(42, b"This is a test!");
        let parsed = Packet::parse(pkt.raw()).unwrap();
        assert_eq!(parsed.size(), pkt.size());
        assert_eq!(parsed.kind(), PacketType::Data);
        assert_eq!(parsed.route_id(), 42);
        assert_eq!(parsed.payload(), b"This is a test!");
    }

    #[test]
    fn truncated_frame_is_corrupted() {
        let pkt = make_data_packet(1, b"hello");
        let truncated = &pkt.raw()[..pkt.raw().len() - 1];
        assert!(Packet::parse(truncated).is_err());
    }
}

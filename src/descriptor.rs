//! Identifiers that make up a route descriptor: public/secret keys and the
//! four-tuple that names one direction of a session.

use std::fmt;

pub type Port = u16;
pub type RouteId = u32;

/// Opaque 32-byte visor or setup-node identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    pub const fn zero() -> Self {
        PublicKey([0u8; 32])
    }

    pub fn from_bytes(b: [u8; 32]) -> Self {
        PublicKey(b)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0[..4] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, "..")
    }
}

/// Opaque 32-byte secret key. Never logged or displayed.
#[derive(Clone, Copy)]
pub struct SecretKey(pub [u8; 32]);

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(..)")
    }
}

/// Identifies one direction of a session: `(srcPK, dstPK, srcPort, dstPort)`.
/// Immutable once constructed and totally ordered across all four fields so
/// it can key a `BTreeMap`/`HashMap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteDescriptor {
    pub src_pk: PublicKey,
    pub dst_pk: PublicKey,
    pub src_port: Port,
    pub dst_port: Port,
}

impl RouteDescriptor {
    pub fn new(src_pk: PublicKey, dst_pk: PublicKey, src_port: Port, dst_port: Port) -> Self {
        RouteDescriptor {
            src_pk,
            dst_pk,
            src_port,
            dst_port,
        }
    }

    /// The descriptor as seen from the other end of the session.
    pub fn reversed(&self) -> RouteDescriptor {
        RouteDescriptor {
            src_pk: self.dst_pk,
            dst_pk: self.src_pk,
            src_port: self.dst_port,
            dst_port: self.src_port,
        }
    }
}

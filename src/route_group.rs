//! Route Group: per-`(local,remote,lport,rport)` session state. Shared
//! between the router (which enqueues consumed payloads and appends edge
//! rules) and whichever external caller obtained it from `DialRoutes` or
//! `AcceptRoutes`.
//!
//! The read path is a bounded channel rather than the unbounded one the
//! original implementation used: under bursty arrivals an unbounded queue
//! just moves the backpressure problem into memory growth. This drops the
//! oldest buffered payload on overflow instead of blocking the dispatcher.

use crate::descriptor::RouteDescriptor;
use crate::error::{Result, RouterError};
use crate::rule::Rule;
use crate::transport::Transport;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Notify, mpsc};
use tracing::warn;

/// Depth of the per-group read queue. See the module doc for the rationale.
pub const READ_QUEUE_CAPACITY: usize = 256;

struct Edges {
    fwd: Vec<Rule>,
    rvs: Vec<Rule>,
    transports: Vec<Arc<dyn Transport>>,
}

pub struct RouteGroup {
    desc: RouteDescriptor,
    edges: Mutex<Edges>,
    read_tx: mpsc::Sender<Vec<u8>>,
    read_rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    closing: AtomicBool,
    done: Notify,
}

impl RouteGroup {
    pub fn new(desc: RouteDescriptor) -> Arc<Self> {
        let (read_tx, read_rx) = mpsc::channel(READ_QUEUE_CAPACITY);
        Arc::new(RouteGroup {
            desc,
            edges: Mutex::new(Edges {
                fwd: Vec::new(),
                rvs: Vec::new(),
                transports: Vec::new(),
            }),
            read_tx,
            read_rx: Mutex::new(read_rx),
            closing: AtomicBool::new(false),
            done: Notify::new(),
        })
    }

    pub fn descriptor(&self) -> RouteDescriptor {
        self.desc
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Appends one edge's forward rule, reverse rule and bound transport.
    /// Forward rules append to `fwd`, reverse rules append to `rvs` — kept
    /// as two separate pushes on purpose (an earlier revision of this
    /// routine appended both onto `fwd`, which silently dropped every
    /// reverse rule but the first).
    pub async fn append_edge(&self, forward: Rule, reverse: Rule, transport: Arc<dyn Transport>) {
        let mut edges = self.edges.lock().await;
        edges.fwd.push(forward);
        edges.rvs.push(reverse);
        edges.transports.push(transport);
    }

    /// Called by the dispatcher under a `Consume` rule match. Drops the
    /// oldest buffered payload rather than blocking when the queue is full.
    pub async fn enqueue(&self, payload: Vec<u8>) -> Result<()> {
        if self.is_closing() {
            return Err(RouterError::Closed);
        }
        if let Err(mpsc::error::TrySendError::Full(payload)) = self.read_tx.try_send(payload) {
            let mut rx = self.read_rx.lock().await;
            let _ = rx.try_recv();
            drop(rx);
            warn!(descriptor = ?self.desc, "read queue full, dropped oldest payload");
            let _ = self.read_tx.try_send(payload);
        }
        Ok(())
    }

    /// Blocks until a payload is enqueued or the group closes.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if self.is_closing() {
            return Err(RouterError::Closed);
        }
        let mut rx = self.read_rx.lock().await;
        tokio::select! {
            biased;
            _ = self.done.notified() => Err(RouterError::Closed),
            maybe = rx.recv() => match maybe {
                Some(payload) => {
                    let n = payload.len().min(buf.len());
                    buf[..n].copy_from_slice(&payload[..n]);
                    Ok(n)
                }
                None => Err(RouterError::Closed),
            },
        }
    }

    /// Encodes a data packet against the most recently appended forward
    /// rule and writes it on the most recently appended transport
    /// (last-wins: a re-keyed path supersedes the one it replaces).
    pub async fn write(&self, buf: &[u8]) -> Result<usize> {
        if self.is_closing() {
            return Err(RouterError::Closed);
        }
        let edges = self.edges.lock().await;
        let rule = edges.fwd.last().ok_or(RouterError::NoTransport)?;
        let transport = edges.transports.last().ok_or(RouterError::NoTransport)?;
        let next_route_id = rule.next_route_id().ok_or(RouterError::NoTransport)?;
        let pkt = crate::packet::make_data_packet(next_route_id, buf);
        transport.write_packet(pkt).await?;
        Ok(buf.len())
    }

    /// Idempotent. Marks the group closing and wakes every pending `read`.
    pub fn close(&self) {
        self.closing.store(true, Ordering::Release);
        self.done.notify_waiters();
    }

    pub async fn transport_count(&self) -> usize {
        self.edges.lock().await.transports.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PublicKey;

    fn desc() -> RouteDescriptor {
        RouteDescriptor::new(PublicKey::zero(), PublicKey::from_bytes([1u8; 32]), 1, 2)
    }

    #[tokio::test]
    async fn enqueue_then_read_preserves_order() {
        let rg = RouteGroup::new(desc());
        rg.enqueue(b"first".to_vec()).await.unwrap();
        rg.enqueue(b"second".to_vec()).await.unwrap();

        let mut buf = [0u8; 16];
        let n = rg.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"first");
        let n = rg.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"second");
    }

    #[tokio::test]
    async fn read_after_close_fails_closed() {
        let rg = RouteGroup::new(desc());
        rg.close();
        let mut buf = [0u8; 8];
        assert_eq!(rg.read(&mut buf).await.unwrap_err(), RouterError::Closed);
    }

    #[tokio::test]
    async fn enqueue_after_close_fails_closed() {
        let rg = RouteGroup::new(desc());
        rg.close();
        assert_eq!(
            rg.enqueue(b"x".to_vec()).await.unwrap_err(),
            RouterError::Closed
        );
    }
}

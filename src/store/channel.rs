//! Sink forwarding batches over a tokio mpsc channel

use super::messages::WriteBatch;
use super::{BatchSink, StoreError};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Hands each batch to a downstream consumer task
pub struct ChannelSink {
    tx: mpsc::Sender<WriteBatch>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<WriteBatch>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiver end, with room for `capacity` in-flight batches
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<WriteBatch>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl BatchSink for ChannelSink {
    async fn publish(&mut self, batch: &WriteBatch) -> Result<(), StoreError> {
        self.tx
            .send(batch.clone())
            .await
            .map_err(|_| StoreError::Closed)
    }

    async fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "Channel"
    }
}

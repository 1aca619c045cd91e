//! Bounded background queue for index mirroring
//!
//! Writes hand their index operation to this queue and return immediately.
//! A dispatcher drains it into `max_in_flight` lanes, routing by resource
//! id. Each lane applies its operations one at a time, so operations on the
//! same id reach the delegate in submission order while different ids
//! proceed concurrently. When the queue is full the new operation is
//! dropped and counted.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::SearchDelegate;
use crate::resource::Resource;

#[derive(Debug, Clone)]
pub enum IndexOp {
    Upsert(Resource),
    Remove(String),
}

impl IndexOp {
    fn id(&self) -> &str {
        match self {
            IndexOp::Upsert(resource) => &resource.id,
            IndexOp::Remove(id) => id,
        }
    }
}

#[derive(Clone)]
pub struct IndexQueue {
    tx: mpsc::Sender<IndexOp>,
}

impl IndexQueue {
    /// Start the dispatcher and its lanes on the current runtime.
    pub fn spawn(delegate: Arc<SearchDelegate>, capacity: usize, max_in_flight: usize) -> Self {
        let capacity = capacity.max(1);
        let lane_count = max_in_flight.max(1);
        let (tx, rx) = mpsc::channel(capacity);

        let lanes = (0..lane_count)
            .map(|_| {
                let (lane_tx, lane_rx) = mpsc::channel(capacity.div_ceil(lane_count));
                tokio::spawn(run_lane(delegate.clone(), lane_rx));
                lane_tx
            })
            .collect();
        tokio::spawn(dispatch(rx, lanes));

        Self { tx }
    }

    /// Enqueue without waiting. Returns false when the operation was dropped.
    pub fn submit(&self, op: IndexOp) -> bool {
        match self.tx.try_send(op) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(op)) => {
                metrics::counter!("larder_search_queue_dropped_total").increment(1);
                tracing::warn!(id = %op.id(), "search index queue full, dropping operation");
                false
            }
            Err(mpsc::error::TrySendError::Closed(op)) => {
                tracing::warn!(id = %op.id(), "search index worker stopped, dropping operation");
                false
            }
        }
    }
}

/// Lane for an id. Stable for the life of the process.
fn lane_for(id: &str, lanes: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    (hasher.finish() % lanes as u64) as usize
}

async fn dispatch(mut rx: mpsc::Receiver<IndexOp>, lanes: Vec<mpsc::Sender<IndexOp>>) {
    while let Some(op) = rx.recv().await {
        let lane = &lanes[lane_for(op.id(), lanes.len())];
        if lane.send(op).await.is_err() {
            break;
        }
    }
    tracing::debug!("search index dispatcher exiting");
}

async fn run_lane(delegate: Arc<SearchDelegate>, mut rx: mpsc::Receiver<IndexOp>) {
    while let Some(op) = rx.recv().await {
        match op {
            IndexOp::Upsert(resource) => delegate.index(&resource).await,
            IndexOp::Remove(id) => delegate.delete(&id).await,
        }
    }
}

use crate::error::SessionError;
use rendezvous_core::{IceCandidateMsg, PeerId};
use std::collections::VecDeque;
use std::future::Future;
use tracing::{debug, warn};

/// Outcome of draining the buffer. Failures do not stop the drain.
#[derive(Debug, Default)]
pub struct DrainReport {
    pub applied: usize,
    pub failures: Vec<SessionError>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// FIFO of remote candidates that arrived before a remote description existed.
#[derive(Debug, Default)]
pub struct CandidateBuffer {
    queue: VecDeque<IceCandidateMsg>,
    limit: Option<usize>,
}

impl CandidateBuffer {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            queue: VecDeque::new(),
            limit,
        }
    }

    pub fn enqueue(&mut self, candidate: IceCandidateMsg) -> Result<(), SessionError> {
        if let Some(limit) = self.limit
            && self.queue.len() >= limit
        {
            return Err(SessionError::QueueOverflow { limit });
        }

        self.queue.push_back(candidate);
        debug!("Buffered remote candidate ({} pending)", self.queue.len());
        Ok(())
    }

    /// Apply every buffered candidate in arrival order.
    pub async fn drain_into<F, Fut>(&mut self, mut apply: F) -> DrainReport
    where
        F: FnMut(IceCandidateMsg) -> Fut,
        Fut: Future<Output = Result<(), SessionError>>,
    {
        let mut report = DrainReport::default();

        while let Some(candidate) = self.queue.pop_front() {
            match apply(candidate).await {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    warn!("Buffered candidate rejected during drain: {}", e);
                    report.failures.push(e);
                }
            }
        }

        report
    }

    /// Drop candidates that belong to any peer other than `peer`.
    pub fn retain_peer(&mut self, peer: &PeerId) {
        let before = self.queue.len();
        self.queue.retain(|c| &c.peer == peer);

        let dropped = before - self.queue.len();
        if dropped > 0 {
            debug!("Dropped {} candidates from peers other than {}", dropped, peer);
        }
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

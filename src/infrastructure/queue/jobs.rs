use async_channel::{Receiver, Sender};
use tracing::debug;

use crate::modules::media::events::TranscodeJob;

/// In-process queue feeding the transcoder workers.
///
/// Enqueueing never waits: the caller gets control back immediately and
/// the only result channel is the persisted asset record.
#[derive(Clone)]
pub struct TranscodeQueue {
    sender: Sender<TranscodeJob>,
}

impl TranscodeQueue {
    pub fn unbounded() -> (Self, Receiver<TranscodeJob>) {
        let (sender, receiver) = async_channel::unbounded();
        (Self { sender }, receiver)
    }

    /// Hands the job back when the queue has been closed.
    pub fn enqueue(&self, job: TranscodeJob) -> Result<(), TranscodeJob> {
        self.sender.try_send(job).map_err(|e| e.into_inner())?;
        debug!(pending = self.sender.len(), "Transcode job enqueued");
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.sender.len()
    }

    /// Stops accepting jobs. Workers finish what is already queued.
    pub fn close(&self) {
        self.sender.close();
    }
}

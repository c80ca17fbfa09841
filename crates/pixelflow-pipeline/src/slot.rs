use std::sync::mpsc::{self, RecvTimeoutError, SyncSender, TrySendError};
use std::time::Duration;

use pixelflow_image::PixelBuffer;

/// Create a single-frame handoff between the capture thread and the consumer.
///
/// At most one frame waits in the slot. A frame offered while the slot is
/// full is dropped, so the consumer always works on a recent frame and the
/// producer never blocks.
pub(crate) fn frame_slot() -> (SlotSender, SlotReceiver) {
    let (tx, rx) = mpsc::sync_channel(1);
    (SlotSender { tx }, SlotReceiver { rx })
}

pub(crate) struct SlotSender {
    tx: SyncSender<PixelBuffer>,
}

impl SlotSender {
    /// Offer a frame. Returns `false` if it was dropped.
    pub(crate) fn offer(&self, frame: PixelBuffer) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::trace!("frame slot full, dropping frame");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// The consuming end. It reports disconnection once the producer is gone
/// and the slot is drained.
pub(crate) struct SlotReceiver {
    rx: mpsc::Receiver<PixelBuffer>,
}

impl SlotReceiver {
    pub(crate) fn recv_timeout(&self, timeout: Duration) -> Result<PixelBuffer, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    #[cfg(test)]
    pub(crate) fn try_recv(&self) -> Result<PixelBuffer, mpsc::TryRecvError> {
        self.rx.try_recv()
    }
}

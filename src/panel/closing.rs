use super::{PanelError, PanelResult};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

/// Creates the single-fire closing channel of one panel activation.
pub fn channel() -> (Closer, Closing) {
    let (tx, rx) = mpsc::channel();
    (Closer { tx }, Closing { rx, done: false })
}

/// Sending half. Closing consumes it, so a handle can fire only once.
#[derive(Debug)]
pub struct Closer {
    tx: Sender<PanelResult>,
}

impl Closer {
    pub fn close(self, result: PanelResult) {
        // The host may already be gone during shutdown.
        let _ = self.tx.send(result);
    }
}

/// Receiving half held by the host.
#[derive(Debug)]
pub struct Closing {
    rx: Receiver<PanelResult>,
    done: bool,
}

impl Closing {
    /// Returns the result the first time one is available, `None` afterwards.
    pub fn try_take(&mut self) -> Option<PanelResult> {
        if self.done {
            return None;
        }
        match self.rx.try_recv() {
            Ok(result) => {
                self.done = true;
                Some(result)
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Closing state shared by every panel variant.
#[derive(Debug)]
pub struct PanelCore {
    closer: Option<Closer>,
    closing: Closing,
    visible: bool,
}

impl PanelCore {
    pub fn new() -> Self {
        let (closer, closing) = channel();
        Self {
            closer: Some(closer),
            closing,
            visible: false,
        }
    }

    /// Marks the activation visible. Returns false when it already was.
    pub(crate) fn mark_visible(&mut self) -> bool {
        if self.visible {
            return false;
        }
        self.visible = true;
        true
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_none()
    }

    pub fn close(&mut self, result: PanelResult) -> Result<(), PanelError> {
        if !self.visible {
            return Err(PanelError::NotVisible);
        }
        let closer = self.closer.take().ok_or(PanelError::AlreadyClosed)?;
        closer.close(result);
        Ok(())
    }

    pub(crate) fn take_result(&mut self) -> Option<PanelResult> {
        self.closing.try_take()
    }
}

impl Default for PanelCore {
    fn default() -> Self {
        Self::new()
    }
}

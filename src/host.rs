use crate::panel::{Panel, PanelContext, PanelError, PanelResult};
use crossterm::event::KeyEvent;
use std::collections::VecDeque;

/// Holds the displayed panel. Detaching is how the host releases it.
pub struct ContentWrapper {
    content: Option<Panel>,
}

impl ContentWrapper {
    pub fn new(panel: Panel) -> Self {
        Self {
            content: Some(panel),
        }
    }

    pub fn content(&self) -> Option<&Panel> {
        self.content.as_ref()
    }

    pub fn content_mut(&mut self) -> Option<&mut Panel> {
        self.content.as_mut()
    }

    pub fn is_attached(&self) -> bool {
        self.content.is_some()
    }

    /// Makes the content visible. Fails once the content was detached.
    pub fn show(&mut self, ctx: &mut PanelContext<'_>) -> Result<(), PanelError> {
        let panel = self.content.as_mut().ok_or(PanelError::Detached)?;
        panel.become_visible(ctx);
        Ok(())
    }

    pub fn detach(&mut self) -> Option<Panel> {
        self.content.take()
    }
}

/// Shows one panel at a time and queues the rest.
#[derive(Default)]
pub struct BusyHost {
    current: Option<ContentWrapper>,
    queue: VecDeque<Panel>,
}

impl BusyHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.current.as_ref().is_some_and(ContentWrapper::is_attached)
    }

    pub fn current(&self) -> Option<&Panel> {
        self.current.as_ref().and_then(ContentWrapper::content)
    }

    pub fn current_mut(&mut self) -> Option<&mut Panel> {
        self.current.as_mut().and_then(ContentWrapper::content_mut)
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Shows `panel` now when idle, otherwise queues it. With `swap_immediately`
    /// the panel goes on top and the displayed one moves to the front of the queue.
    pub fn show(&mut self, panel: Panel, swap_immediately: bool, ctx: &mut PanelContext<'_>) {
        if self.current.is_none() && self.queue.is_empty() {
            self.display(panel, ctx);
            return;
        }
        if swap_immediately {
            log::info!("Immediately swapping to panel {}", panel.id().label());
            if let Some(previous) = self.current.take().and_then(|mut wrapper| wrapper.detach()) {
                self.queue.push_front(previous);
            }
            self.display(panel, ctx);
        } else {
            log::info!("Queueing panel {}", panel.id().label());
            self.queue.push_back(panel);
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, ctx: &mut PanelContext<'_>) -> bool {
        match self.current_mut() {
            Some(panel) => panel.handle_key(key, ctx),
            None => false,
        }
    }

    /// Polls the displayed panel. When it has closed, releases it, shows the
    /// next queued panel and returns the closed panel's result.
    pub fn pump(&mut self, ctx: &mut PanelContext<'_>) -> Option<PanelResult> {
        let panel = self.current_mut()?;
        panel.poll(ctx);
        let result = panel.take_result()?;

        if let Some(closed) = self.current.take().and_then(|mut wrapper| wrapper.detach()) {
            log::info!("Released panel {}", closed.id().label());
        }
        if let Some(next) = self.queue.pop_front() {
            self.display(next, ctx);
        }
        Some(result)
    }

    fn display(&mut self, panel: Panel, ctx: &mut PanelContext<'_>) {
        if panel.is_closed() {
            log::warn!("Not showing {}, it already closed", panel.id().label());
            return;
        }
        if panel.is_visible() {
            log::info!("Showing panel {} again", panel.id().label());
        } else {
            log::info!("Showing panel {}", panel.id().label());
        }
        let mut wrapper = ContentWrapper::new(panel);
        if let Err(err) = wrapper.show(ctx) {
            log::error!("Cannot show panel: {err}");
            return;
        }
        self.current = Some(wrapper);
    }
}

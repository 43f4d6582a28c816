use super::{
    task::{self, CancelToken, TaskAction, TaskFault, TaskHandle, TaskOutcome},
    BusyPanel, ClosingPayload, PanelContext, PanelCore, PanelId, PanelResult,
};
use crossterm::event::KeyEvent;

const WORKER_NAME: &str = "RunAndDoneThread";

/// Shows a spinner while one action runs on a worker, then closes itself.
pub struct RunAndDonePanel {
    core: PanelCore,
    action_text: String,
    action: Option<TaskAction>,
    token: CancelToken,
    handle: Option<TaskHandle>,
}

impl RunAndDonePanel {
    pub fn new<F>(action_text: &str, action: F) -> Self
    where
        F: FnOnce(&CancelToken) -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            core: PanelCore::new(),
            action_text: action_text.to_string(),
            action: Some(Box::new(action)),
            token: CancelToken::new(),
            handle: None,
        }
    }

    pub fn action_text(&self) -> &str {
        &self.action_text
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Asks the action to stop at its next checkpoint.
    pub fn cancel(&self) {
        match &self.handle {
            Some(handle) => handle.token().cancel(),
            None => self.token.cancel(),
        }
    }

    fn finish(&mut self, outcome: TaskOutcome) {
        match &outcome {
            TaskOutcome::Completed => log::info!("{} finished", self.action_text),
            TaskOutcome::Faulted(fault) => log::error!(
                "Exception occurred in {} thread: {}",
                fault.worker,
                fault.message
            ),
            TaskOutcome::Cancelled => log::info!("{} cancelled", self.action_text),
        }
        let _ = self.close_with(PanelResult::with_payload(ClosingPayload::Task(outcome)));
    }
}

impl BusyPanel for RunAndDonePanel {
    fn id(&self) -> PanelId {
        PanelId::RunAndDone
    }

    fn core(&self) -> &PanelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PanelCore {
        &mut self.core
    }

    fn on_visible(&mut self, _ctx: &mut PanelContext<'_>) {
        let Some(action) = self.action.take() else {
            return;
        };
        log::info!("Running {}", self.action_text);
        match task::spawn_named(WORKER_NAME, self.token.clone(), action) {
            Ok(handle) => self.handle = Some(handle),
            Err(err) => self.finish(TaskOutcome::Faulted(TaskFault {
                worker: WORKER_NAME.to_string(),
                message: err.to_string(),
            })),
        }
    }

    // Closes on its own.
    fn handle_key(&mut self, _key: KeyEvent, _ctx: &mut PanelContext<'_>) -> bool {
        false
    }

    fn poll(&mut self, _ctx: &mut PanelContext<'_>) {
        let Some(handle) = self.handle.as_ref() else {
            return;
        };
        let Some(outcome) = handle.try_outcome() else {
            return;
        };
        log::debug!("Worker {} reported back", handle.name());
        self.handle = None;
        self.finish(outcome);
    }
}

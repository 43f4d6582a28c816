use super::PanelError;
use std::{
    any::Any,
    cell::Cell,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, TryRecvError},
        Arc, Once,
    },
    thread,
};
use thiserror::Error;

thread_local! {
    static ON_WORKER: Cell<bool> = const { Cell::new(false) };
}

pub type TaskAction = Box<dyn FnOnce(&CancelToken) -> anyhow::Result<()> + Send + 'static>;

/// Cooperative cancellation flag checked by the action at safe points.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Returns `Err(Cancelled)` once cancellation was requested.
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{worker}: {message}")]
pub struct TaskFault {
    pub worker: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Faulted(TaskFault),
    Cancelled,
}

/// A running worker. The outcome is read from the interactive loop.
#[derive(Debug)]
pub struct TaskHandle {
    name: String,
    rx: Receiver<TaskOutcome>,
    token: CancelToken,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn try_outcome(&self) -> Option<TaskOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(TaskOutcome::Faulted(TaskFault {
                worker: self.name.clone(),
                message: "worker exited without reporting".to_string(),
            })),
        }
    }
}

/// Runs `action` on a named thread. Errors and panics are captured as faults.
pub fn spawn_named(
    name: &str,
    token: CancelToken,
    action: TaskAction,
) -> Result<TaskHandle, PanelError> {
    let (tx, rx) = mpsc::channel();
    let worker = name.to_string();
    let worker_token = token.clone();
    log::debug!("Starting worker {worker}");
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            ON_WORKER.with(|flag| flag.set(true));
            let result = panic::catch_unwind(AssertUnwindSafe(|| action(&worker_token)));
            let outcome = match result {
                Ok(Ok(())) => TaskOutcome::Completed,
                Ok(Err(err)) if err.is::<Cancelled>() => TaskOutcome::Cancelled,
                Ok(Err(err)) => TaskOutcome::Faulted(TaskFault {
                    worker,
                    message: format!("{err:#}"),
                }),
                Err(payload) => TaskOutcome::Faulted(TaskFault {
                    worker,
                    message: panic_message(payload.as_ref()),
                }),
            };
            let _ = tx.send(outcome);
        })
        .map_err(PanelError::Spawn)?;

    Ok(TaskHandle {
        name: name.to_string(),
        rx,
        token,
    })
}

/// Sends panics raised on workers to the log. The terminal is in raw mode while
/// they run, so the default hook's stderr report would garble the screen.
/// Panics on other threads keep the previous hook.
pub fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !ON_WORKER.with(Cell::get) {
                previous(info);
                return;
            }
            let worker = thread::current().name().unwrap_or("worker").to_string();
            let location = info
                .location()
                .map(|location| format!("{}:{}", location.file(), location.line()))
                .unwrap_or_else(|| "unknown location".to_string());
            log::error!(
                "Worker {worker} panicked at {location}: {}",
                panic_message(info.payload())
            );
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::testing::{capture_logs, captured_logs};
    use std::{
        sync::Mutex,
        time::{Duration, Instant},
    };

    fn action<F>(f: F) -> TaskAction
    where
        F: FnOnce(&CancelToken) -> anyhow::Result<()> + Send + 'static,
    {
        Box::new(f)
    }

    fn wait_for(handle: &TaskHandle) -> TaskOutcome {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(outcome) = handle.try_outcome() {
                return outcome;
            }
            assert!(Instant::now() < deadline, "worker never finished");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn completed_action_reports_completed() {
        let handle = spawn_named("ok", CancelToken::new(), action(|_| Ok(()))).unwrap();
        assert_eq!(handle.name(), "ok");
        assert_eq!(wait_for(&handle), TaskOutcome::Completed);
    }

    #[test]
    fn error_is_captured_with_worker_name() {
        let handle = spawn_named(
            "Failing",
            CancelToken::new(),
            action(|_| Err(anyhow::anyhow!("disk full"))),
        )
        .unwrap();
        match wait_for(&handle) {
            TaskOutcome::Faulted(fault) => {
                assert_eq!(fault.worker, "Failing");
                assert_eq!(fault.message, "disk full");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn divide_by_zero_panic_becomes_fault() {
        let handle = spawn_named(
            "Divider",
            CancelToken::new(),
            action(|_| {
                let zero = std::hint::black_box(0u32);
                let _ = std::hint::black_box(1u32 / zero);
                Ok(())
            }),
        )
        .unwrap();
        match wait_for(&handle) {
            TaskOutcome::Faulted(fault) => assert!(fault.message.contains("divide by zero")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn checkpoint_after_cancel_reports_cancelled() {
        let token = CancelToken::new();
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let handle = spawn_named(
            "Cancellable",
            token.clone(),
            action(move |token| {
                let _ = go_rx.recv();
                token.checkpoint()?;
                Ok(())
            }),
        )
        .unwrap();
        handle.token().cancel();
        assert!(token.is_cancelled());
        go_tx.send(()).unwrap();
        assert_eq!(wait_for(&handle), TaskOutcome::Cancelled);
    }

    static FORWARDED: Mutex<Vec<String>> = Mutex::new(Vec::new());

    #[test]
    fn worker_panic_is_logged_instead_of_printed() {
        capture_logs();
        // Stands in for the default hook, which writes to stderr.
        let default = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if let Some(name) = thread::current().name() {
                FORWARDED.lock().unwrap().push(name.to_string());
            }
            default(info);
        }));
        install_panic_hook();

        let handle = spawn_named(
            "QuietPanic",
            CancelToken::new(),
            action(|_| panic!("keybinds table missing")),
        )
        .unwrap();
        match wait_for(&handle) {
            TaskOutcome::Faulted(fault) => assert_eq!(fault.message, "keybinds table missing"),
            other => panic!("unexpected outcome {other:?}"),
        }

        assert!(!FORWARDED.lock().unwrap().iter().any(|name| name == "QuietPanic"));
        assert!(captured_logs().iter().any(|line| line.starts_with("ERROR")
            && line.contains("QuietPanic")
            && line.contains("keybinds table missing")));
    }
}

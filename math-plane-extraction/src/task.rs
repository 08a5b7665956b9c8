//! Background tasks with observable status

use crate::cancel::CancelToken;
use crate::error::{ExtractionError, Result};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

struct Shared<T> {
    slot: Mutex<Option<Result<T>>>,
    done: Condvar,
}

/// Handle to work running on its own thread.
///
/// The result can be polled with [`try_result`](Self::try_result) or awaited
/// with [`wait`](Self::wait). Dropping the handle detaches the task.
pub struct TaskHandle<T> {
    shared: Arc<Shared<T>>,
    cancel: CancelToken,
    thread: Option<JoinHandle<()>>,
}

/// Run `work` on a new thread. The closure receives the task's cancel token.
pub fn spawn<T, F>(name: &str, work: F) -> Result<TaskHandle<T>>
where
    T: Send + 'static,
    F: FnOnce(&CancelToken) -> Result<T> + Send + 'static,
{
    let shared = Arc::new(Shared {
        slot: Mutex::new(None),
        done: Condvar::new(),
    });
    let cancel = CancelToken::new();

    let worker_shared = Arc::clone(&shared);
    let worker_cancel = cancel.clone();
    let thread = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| work(&worker_cancel)))
                .unwrap_or_else(|payload| Err(ExtractionError::TaskPanicked(panic_message(payload))));

            if let Err(err) = &result {
                log::warn!("task failed: {}", err);
            }
            let mut slot = worker_shared
                .slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *slot = Some(result);
            worker_shared.done.notify_all();
        })
        .map_err(|e| ExtractionError::TaskPanicked(format!("could not start task: {}", e)))?;

    Ok(TaskHandle {
        shared,
        cancel,
        thread: Some(thread),
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl<T> TaskHandle<T> {
    pub fn status(&self) -> TaskStatus {
        let slot = self
            .shared
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match &*slot {
            None => TaskStatus::Running,
            Some(Ok(_)) => TaskStatus::Completed,
            Some(Err(_)) => TaskStatus::Failed,
        }
    }

    /// Request cooperative cancellation
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The result if the task finished, otherwise the handle back
    pub fn try_result(mut self) -> std::result::Result<Result<T>, Self> {
        let taken = self
            .shared
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match taken {
            Some(result) => {
                self.join();
                Ok(result)
            }
            None => Err(self),
        }
    }

    /// Block until the task finishes
    pub fn wait(mut self) -> Result<T> {
        let result = {
            let mut slot = self
                .shared
                .slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            loop {
                if let Some(result) = slot.take() {
                    break result;
                }
                slot = self
                    .shared
                    .done
                    .wait(slot)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };
        self.join();
        result
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            log::error!("task thread panicked after storing its result");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_wait_returns_value() {
        let task = spawn("sum", |_| Ok((1..=10).sum::<u32>())).unwrap();
        assert_eq!(task.wait().unwrap(), 55);
    }

    #[test]
    fn test_status_and_poll() {
        let (tx, rx) = mpsc::channel::<()>();
        let task = spawn("gate", move |_| {
            rx.recv().ok();
            Ok("done")
        })
        .unwrap();

        assert_eq!(task.status(), TaskStatus::Running);
        let task = match task.try_result() {
            Ok(_) => panic!("task finished before release"),
            Err(handle) => handle,
        };

        tx.send(()).unwrap();
        while task.status() == TaskStatus::Running {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(task.status(), TaskStatus::Completed);
        assert!(matches!(task.try_result(), Ok(Ok("done"))));
    }

    #[test]
    fn test_cancel_is_seen_by_work() {
        let task = spawn("spin", |cancel| {
            loop {
                cancel.check()?;
                thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();

        task.cancel();
        let handle_result: Result<()> = task.wait();
        assert!(matches!(handle_result, Err(ExtractionError::Cancelled)));
    }

    #[test]
    fn test_failure_status() {
        let task = spawn::<(), _>("fail", |_| Err(ExtractionError::NoFileSelected)).unwrap();
        while task.status() == TaskStatus::Running {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(task.status(), TaskStatus::Failed);
    }

    #[test]
    fn test_panic_is_captured() {
        let task = spawn::<(), _>("boom", |_| panic!("exploded")).unwrap();
        match task.wait() {
            Err(ExtractionError::TaskPanicked(msg)) => assert_eq!(msg, "exploded"),
            other => panic!("unexpected {other:?}"),
        }
    }
}

//! Next-tick scheduling for deferred element updates
//!
//! A read-direction binding never applies observer changes synchronously. It
//! schedules one task through a [`Scheduler`] and keeps the returned
//! [`TaskHandle`] so a later `unlink` can cancel it.
//!
//! - [`TickQueue`]: manual queue, drained with [`TickQueue::run_pending`].
//!   Deterministic, used by tests and by hosts that own their frame loop.
//! - [`LocalTaskScheduler`] (feature `tasks`): runs each task on the tokio
//!   `LocalSet` after the current task yields.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// Something that can run a task "soon", on the same thread
pub trait Scheduler {
    fn schedule(&self, task: Box<dyn FnOnce()>) -> TaskHandle;
}

/// Cancels a scheduled task. Dropping the handle does not cancel.
pub struct TaskHandle {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

impl TaskHandle {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Handle for a task that cannot be cancelled (already ran, or inline)
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    /// Prevent the task from running if it has not run yet
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

struct QueuedTask {
    task: Box<dyn FnOnce()>,
    cancelled: Rc<Cell<bool>>,
}

/// Manually driven next-tick queue. Clones share the queue.
#[derive(Clone, Default)]
pub struct TickQueue {
    queue: Rc<RefCell<VecDeque<QueuedTask>>>,
}

impl fmt::Debug for TickQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

impl TickQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every task queued before this call, returning how many ran.
    ///
    /// Tasks scheduled while running wait for the next call.
    pub fn run_pending(&self) -> usize {
        let batch = std::mem::take(&mut *self.queue.borrow_mut());
        let mut ran = 0;
        for queued in batch {
            if queued.cancelled.get() {
                continue;
            }
            (queued.task)();
            ran += 1;
        }
        ran
    }

    /// Number of queued tasks that have not been cancelled
    pub fn pending(&self) -> usize {
        self.queue
            .borrow()
            .iter()
            .filter(|queued| !queued.cancelled.get())
            .count()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }
}

impl Scheduler for TickQueue {
    fn schedule(&self, task: Box<dyn FnOnce()>) -> TaskHandle {
        let cancelled = Rc::new(Cell::new(false));
        self.queue.borrow_mut().push_back(QueuedTask {
            task,
            cancelled: Rc::clone(&cancelled),
        });
        TaskHandle::new(move || cancelled.set(true))
    }
}

/// Runs tasks with `tokio::task::spawn_local`
///
/// Must be used from inside a `tokio::task::LocalSet`. Each task yields once
/// before running so that synchronous bursts of changes settle first;
/// cancelling aborts the spawned task.
#[cfg(feature = "tasks")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTaskScheduler;

#[cfg(feature = "tasks")]
impl LocalTaskScheduler {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "tasks")]
impl Scheduler for LocalTaskScheduler {
    fn schedule(&self, task: Box<dyn FnOnce()>) -> TaskHandle {
        let handle = tokio::task::spawn_local(async move {
            tokio::task::yield_now().await;
            task();
        });
        let abort = handle.abort_handle();
        TaskHandle::new(move || abort.abort())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_queue_runs_in_order() {
        let queue = TickQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let log = Rc::clone(&log);
            let _ = queue.schedule(Box::new(move || log.borrow_mut().push(i)));
        }
        assert_eq!(queue.pending(), 3);
        assert_eq!(queue.run_pending(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(queue.is_idle());
    }

    #[test]
    fn test_cancelled_task_does_not_run() {
        let queue = TickQueue::new();
        let ran = Rc::new(Cell::new(false));

        let r = Rc::clone(&ran);
        let handle = queue.schedule(Box::new(move || r.set(true)));
        handle.cancel();

        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.run_pending(), 0);
        assert!(!ran.get());
    }

    #[test]
    fn test_tasks_scheduled_while_running_wait() {
        let queue = TickQueue::new();
        let count = Rc::new(Cell::new(0));

        let inner_queue = queue.clone();
        let c = Rc::clone(&count);
        let _ = queue.schedule(Box::new(move || {
            c.set(c.get() + 1);
            let c = Rc::clone(&c);
            let _ = inner_queue.schedule(Box::new(move || c.set(c.get() + 1)));
        }));

        assert_eq!(queue.run_pending(), 1);
        assert_eq!(count.get(), 1);
        assert_eq!(queue.run_pending(), 1);
        assert_eq!(count.get(), 2);
    }

    #[cfg(feature = "tasks")]
    #[tokio::test]
    async fn test_local_task_scheduler() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let ran = Rc::new(Cell::new(0));
                let scheduler = LocalTaskScheduler::new();

                let r = Rc::clone(&ran);
                let _ = scheduler.schedule(Box::new(move || r.set(r.get() + 1)));
                let r = Rc::clone(&ran);
                let cancelled = scheduler.schedule(Box::new(move || r.set(r.get() + 10)));
                cancelled.cancel();

                assert_eq!(ran.get(), 0);
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                assert_eq!(ran.get(), 1);
            })
            .await;
    }
}

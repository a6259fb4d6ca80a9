//! # Renderer Tasks
//!
//! Long-running work (light probe baking, reflection captures) that the core
//! thread advances a step at a time between frames.
//!
//! ## State Machine
//!
//! ```text
//!   Idle ──queue──► Queued ──step──► Running ──not done──► Queued
//!                     │                 │
//!                     │                 └──done──► Completed (callback fires)
//!                     └──cancel──► Cancelled (callback never fires)
//! ```
//!
//! A task that reports done while a `cancel` is racing it ends up Cancelled
//! and its callback is dropped. `cancel` returns false only if the task had
//! already completed.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// Lifecycle of a renderer task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Created, not queued yet.
    Idle,
    /// Waiting for its next step.
    Queued,
    /// A step is executing.
    Running,
    /// Finished; the completion callback has been taken.
    Completed,
    /// Cancelled before finishing.
    Cancelled,
}

impl TaskState {
    /// Returns true for Completed and Cancelled.
    #[inline]
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

type StepFn = Box<dyn FnMut() -> bool + Send>;
type CompleteFn = Box<dyn FnOnce() + Send>;

/// A cancellable unit of work executed on the core thread.
pub struct RendererTask {
    name: String,
    state: Mutex<TaskState>,
    state_changed: Condvar,
    step: Mutex<Option<StepFn>>,
    on_complete: Mutex<Option<CompleteFn>>,
}

impl RendererTask {
    /// Creates a task. `step` runs once per core frame and returns true when done.
    #[must_use]
    pub fn new(name: impl Into<String>, step: impl FnMut() -> bool + Send + 'static) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(TaskState::Idle),
            state_changed: Condvar::new(),
            step: Mutex::new(Some(Box::new(step))),
            on_complete: Mutex::new(None),
        })
    }

    /// Task name, for logging.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        *self.state.lock()
    }

    /// Returns true once the task completed normally.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state() == TaskState::Completed
    }

    /// Returns true once the task was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state() == TaskState::Cancelled
    }

    /// Sets the callback fired on the thread that completes the task.
    ///
    /// Fires immediately if the task already completed; dropped if it was
    /// cancelled.
    pub fn on_complete(&self, callback: impl FnOnce() + Send + 'static) {
        let state = self.state.lock();
        let current = *state;
        match current {
            TaskState::Completed => {
                drop(state);
                callback();
            }
            TaskState::Cancelled => {}
            _ => *self.on_complete.lock() = Some(Box::new(callback)),
        }
    }

    /// Cancels the task.
    ///
    /// After this returns true the completion callback will not fire and no
    /// further step will run.
    pub fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        if *state == TaskState::Completed {
            return false;
        }
        if *state != TaskState::Cancelled {
            *state = TaskState::Cancelled;
            self.on_complete.lock().take();
            self.state_changed.notify_all();
            tracing::debug!("Renderer task '{}' cancelled", self.name);
        }
        true
    }

    /// Blocks until the task is completed or cancelled.
    pub fn wait(&self) -> TaskState {
        let mut state = self.state.lock();
        while !state.is_finished() {
            self.state_changed.wait(&mut state);
        }
        *state
    }

    fn mark_queued(&self) {
        let mut state = self.state.lock();
        if *state == TaskState::Idle {
            *state = TaskState::Queued;
        }
    }

    /// Runs one step. Returns true when the task is finished for any reason.
    pub fn run_step(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.is_finished() {
                return true;
            }
            *state = TaskState::Running;
        }

        let done = match self.step.lock().as_mut() {
            Some(step) => step(),
            None => true,
        };

        let callback = {
            let mut state = self.state.lock();
            if *state == TaskState::Cancelled {
                drop(state);
                self.step.lock().take();
                return true;
            }
            if !done {
                *state = TaskState::Queued;
                return false;
            }
            *state = TaskState::Completed;
            self.state_changed.notify_all();
            self.on_complete.lock().take()
        };

        self.step.lock().take();
        tracing::debug!("Renderer task '{}' completed", self.name);
        if let Some(callback) = callback {
            callback();
        }
        true
    }
}

impl std::fmt::Debug for RendererTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererTask")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Anything that accepts renderer tasks for execution.
pub trait TaskSink {
    /// Queues `task`; it will be stepped until done or cancelled.
    fn queue_task(&self, task: Arc<RendererTask>);
}

/// Tasks waiting for their next step.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: Vec<Arc<RendererTask>>,
}

impl TaskQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task.
    pub fn push(&mut self, task: Arc<RendererTask>) {
        task.mark_queued();
        self.tasks.push(task);
    }

    /// Tasks not finished yet.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if nothing is queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Runs one step of every queued task, dropping finished ones.
    ///
    /// Returns the number of tasks still pending.
    pub fn run_pending(&mut self) -> usize {
        self.tasks.retain(|task| !task.run_step());
        self.tasks.len()
    }

    /// Cancels and drops every queued task.
    pub fn cancel_all(&mut self) {
        for task in self.tasks.drain(..) {
            task.cancel();
        }
    }
}

impl TaskSink for Mutex<TaskQueue> {
    fn queue_task(&self, task: Arc<RendererTask>) {
        self.lock().push(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_task(steps_needed: usize) -> (Arc<RendererTask>, Arc<AtomicUsize>) {
        let steps = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&steps);
        let task = RendererTask::new("count", move || {
            counter.fetch_add(1, Ordering::SeqCst) + 1 >= steps_needed
        });
        (task, steps)
    }

    #[test]
    fn test_task_runs_until_done() {
        let (task, steps) = counting_task(3);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        task.on_complete(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        let mut queue = TaskQueue::new();
        queue.push(Arc::clone(&task));
        assert_eq!(task.state(), TaskState::Queued);

        assert_eq!(queue.run_pending(), 1);
        assert_eq!(queue.run_pending(), 1);
        assert_eq!(queue.run_pending(), 0);

        assert_eq!(steps.load(Ordering::SeqCst), 3);
        assert!(task.is_complete());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_suppresses_callback_and_steps() {
        let (task, steps) = counting_task(2);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        task.on_complete(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        let mut queue = TaskQueue::new();
        queue.push(Arc::clone(&task));
        queue.run_pending();
        assert!(task.cancel());

        assert_eq!(queue.run_pending(), 0);
        assert_eq!(steps.load(Ordering::SeqCst), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(task.wait(), TaskState::Cancelled);
    }

    #[test]
    fn test_cancel_after_completion_fails() {
        let (task, _) = counting_task(1);
        assert!(task.run_step());
        assert!(!task.cancel());
        assert!(task.is_complete());
    }

    #[test]
    fn test_callback_after_completion_fires_immediately() {
        let (task, _) = counting_task(1);
        task.run_step();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        task.on_complete(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}

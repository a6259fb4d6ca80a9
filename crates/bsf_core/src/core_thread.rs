//! # Core Thread
//!
//! The render-side thread. It owns nothing the sim thread can touch: work
//! arrives through a channel and consumed frame allocators leave through
//! another.
//!
//! ```text
//!   sim thread                         core thread
//!   ──────────                         ───────────
//!   submit(batch) ──── commands ────►  batch.apply()
//!                                      tasks.run_pending()
//!   reclaim(&mut point) ◄── allocs ──  cleared FrameAlloc
//! ```

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::config::SyncConfig;
use crate::error::{CoreError, CoreResult};
use crate::memory::FrameAlloc;
use crate::sync::{SyncBatch, SyncPoint};
use crate::task::{RendererTask, TaskQueue, TaskSink};

enum Command {
    Sync(SyncBatch),
    Run(Box<dyn FnOnce() + Send>),
    Task(Arc<RendererTask>),
    Flush(Sender<()>),
    Shutdown,
}

/// Handle to the running core thread.
///
/// Dropping the handle stops the thread, cancelling any unfinished tasks.
pub struct CoreThread {
    commands: Sender<Command>,
    returned: Receiver<FrameAlloc>,
    handle: Option<JoinHandle<()>>,
}

impl CoreThread {
    /// Starts the core thread.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Io` if the OS refuses to create the thread.
    pub fn spawn(config: &SyncConfig) -> CoreResult<Self> {
        let (commands, command_rx) = crossbeam_channel::bounded(config.batch_queue_depth);
        let (returned_tx, returned) = crossbeam_channel::unbounded();

        let handle = std::thread::Builder::new()
            .name("bsf-core".to_string())
            .spawn(move || run(&command_rx, &returned_tx))?;

        Ok(Self { commands, returned, handle: Some(handle) })
    }

    /// Queues a sync batch. Blocks if the queue is full.
    ///
    /// After the batch is applied, queued renderer tasks advance one step.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::CoreThreadStopped` if the thread has exited.
    pub fn submit(&self, batch: SyncBatch) -> CoreResult<()> {
        self.send(Command::Sync(batch))
    }

    /// Queues a closure to run on the core thread.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::CoreThreadStopped` if the thread has exited.
    pub fn run(&self, f: impl FnOnce() + Send + 'static) -> CoreResult<()> {
        self.send(Command::Run(Box::new(f)))
    }

    /// Blocks until every command queued before this call has been processed.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::CoreThreadStopped` if the thread has exited, or
    /// `CoreError::CoreThreadPanicked` if it died while processing.
    pub fn flush(&self) -> CoreResult<()> {
        let (ack, done) = crossbeam_channel::bounded(1);
        self.send(Command::Flush(ack))?;
        done.recv().map_err(|_| CoreError::CoreThreadPanicked)
    }

    /// Hands every allocator the core thread has finished with back to `point`.
    ///
    /// Returns the number reclaimed.
    pub fn reclaim(&self, point: &mut SyncPoint) -> usize {
        let mut count = 0;
        for alloc in self.returned.try_iter() {
            point.reclaim(alloc);
            count += 1;
        }
        count
    }

    /// Stops the thread and waits for it to exit.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::CoreThreadPanicked` if the thread panicked.
    pub fn shutdown(mut self) -> CoreResult<()> {
        self.stop()
    }

    fn stop(&mut self) -> CoreResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let _ = self.commands.send(Command::Shutdown);
        handle.join().map_err(|_| CoreError::CoreThreadPanicked)
    }

    fn send(&self, command: Command) -> CoreResult<()> {
        self.commands.send(command).map_err(|_| CoreError::CoreThreadStopped)
    }
}

impl TaskSink for CoreThread {
    fn queue_task(&self, task: Arc<RendererTask>) {
        if self.send(Command::Task(Arc::clone(&task))).is_err() {
            tracing::warn!("Core thread stopped, cancelling task '{}'", task.name());
            task.cancel();
        }
    }
}

impl Drop for CoreThread {
    fn drop(&mut self) {
        if self.stop().is_err() {
            tracing::warn!("Core thread panicked before shutdown");
        }
    }
}

fn run(commands: &Receiver<Command>, returned: &Sender<FrameAlloc>) {
    tracing::info!("Core thread started");
    let mut tasks = TaskQueue::new();

    for command in commands {
        match command {
            Command::Sync(batch) => {
                let alloc = batch.apply();
                // Sim side may already be gone; the allocator is simply dropped then
                let _ = returned.send(alloc);
                tasks.run_pending();
            }
            Command::Run(f) => f(),
            Command::Task(task) => tasks.push(task),
            Command::Flush(ack) => {
                let _ = ack.send(());
            }
            Command::Shutdown => break,
        }
    }

    if !tasks.is_empty() {
        tracing::info!("Core thread cancelling {} unfinished tasks", tasks.len());
    }
    tasks.cancel_all();
    tracing::info!("Core thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_run_and_flush() {
        let thread = CoreThread::spawn(&SyncConfig::default()).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            thread
                .run(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        thread.flush().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        thread.shutdown().unwrap();
    }

    #[test]
    fn test_empty_batch_returns_allocator() {
        let thread = CoreThread::spawn(&SyncConfig::default()).unwrap();
        let mut point = SyncPoint::with_capacity(64);

        let batch = point.begin().finish();
        assert_eq!(point.in_flight(), 1);
        thread.submit(batch).unwrap();
        thread.flush().unwrap();

        assert_eq!(thread.reclaim(&mut point), 1);
        assert_eq!(point.in_flight(), 0);
    }

    #[test]
    fn test_tasks_advance_once_per_batch() {
        let thread = CoreThread::spawn(&SyncConfig::default()).unwrap();
        let mut point = SyncPoint::with_capacity(64);

        let steps = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&steps);
        let task = RendererTask::new("two-steps", move || counter.fetch_add(1, Ordering::SeqCst) == 1);
        thread.queue_task(Arc::clone(&task));

        thread.submit(point.begin().finish()).unwrap();
        thread.flush().unwrap();
        assert_eq!(steps.load(Ordering::SeqCst), 1);
        assert!(!task.is_complete());

        thread.submit(point.begin().finish()).unwrap();
        assert_eq!(task.wait(), crate::task::TaskState::Completed);
        assert_eq!(steps.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drop_cancels_unfinished_tasks() {
        let thread = CoreThread::spawn(&SyncConfig::default()).unwrap();
        let task = RendererTask::new("never", || false);
        thread.queue_task(Arc::clone(&task));
        thread.flush().unwrap();
        drop(thread);
        assert!(task.is_cancelled());
    }
}

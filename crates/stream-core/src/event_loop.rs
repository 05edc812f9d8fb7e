use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::ThreadId;

/// The embedding application's event loop, as seen from this crate.
///
/// The real implementation (an epoll/kqueue/IOCP loop, a GUI event loop,
/// etc.) is deliberately out of scope here — only its contract matters:
/// producer callbacks and deferred tasks always run on the same thread, and
/// nothing posted to it may block that thread for long.
pub trait EventLoop: Send + Sync {
    /// Returns `true` if the calling thread is the event-loop thread.
    fn is_inside(&self) -> bool;

    /// Posts a task to run on the event-loop thread. Never blocks the
    /// caller.
    fn spawn(&self, task: Box<dyn FnOnce() + Send>);
}

/// A minimal, concrete [`EventLoop`]: a dedicated worker thread draining an
/// unbounded queue of boxed closures in order.
///
/// This is the testable stand-in for a real event loop; production
/// embedders plug in their own (a `tokio::runtime`, a GUI main loop, ...).
pub struct ThreadEventLoop {
    sender: mpsc::Sender<Box<dyn FnOnce() + Send>>,
    worker_id: ThreadId,
    _worker: Option<std::thread::JoinHandle<()>>,
}

impl ThreadEventLoop {
    /// Spawns the worker thread and returns a handle to it.
    #[must_use]
    pub fn spawn() -> Self {
        let (sender, receiver) = mpsc::channel::<Box<dyn FnOnce() + Send>>();
        let (id_tx, id_rx) = mpsc::channel();

        let worker = std::thread::Builder::new()
            .name("stream-core-event-loop".into())
            .spawn(move || {
                let _ = id_tx.send(std::thread::current().id());
                while let Ok(task) = receiver.recv() {
                    task();
                }
            })
            .expect("failed to spawn event-loop thread");

        let worker_id = id_rx.recv().expect("event-loop thread failed to start");

        Self {
            sender,
            worker_id,
            _worker: Some(worker),
        }
    }
}

impl EventLoop for ThreadEventLoop {
    fn is_inside(&self) -> bool {
        std::thread::current().id() == self.worker_id
    }

    fn spawn(&self, task: Box<dyn FnOnce() + Send>) {
        // The event loop outliving its senders is the embedder's
        // responsibility; a closed channel here means the loop already
        // shut down, which we treat as a silent no-op rather than a panic.
        let _ = self.sender.send(task);
    }
}

/// A coalescing handle that schedules work onto the event loop from any
/// thread.
///
/// Scheduling twice before the task runs results in exactly one execution;
/// this prevents spurious duplicate `do_resume`/`do_seek` calls when, e.g.,
/// a consumer reads past the watermark twice in quick succession.
pub struct Deferred {
    event_loop: Arc<dyn EventLoop>,
    scheduled: Arc<AtomicBool>,
}

impl Deferred {
    /// Creates a new deferred handle bound to the given event loop.
    pub fn new(event_loop: Arc<dyn EventLoop>) -> Self {
        Self {
            event_loop,
            scheduled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Schedules `action` to run once on the event loop, unless a previous
    /// `schedule` call is still pending — in which case this call is a
    /// no-op.
    pub fn schedule(&self, action: impl FnOnce() + Send + 'static) {
        if self.scheduled.swap(true, Ordering::AcqRel) {
            return;
        }

        let scheduled = Arc::clone(&self.scheduled);
        self.event_loop.spawn(Box::new(move || {
            scheduled.store(false, Ordering::Release);
            action();
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn is_inside_is_false_off_the_worker_thread() {
        let el = ThreadEventLoop::spawn();
        assert!(!el.is_inside());
    }

    #[test]
    fn coalesces_repeated_schedule_calls() {
        let el: Arc<dyn EventLoop> = Arc::new(ThreadEventLoop::spawn());
        let deferred = Deferred::new(Arc::clone(&el));
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let count = Arc::clone(&count);
            deferred.schedule(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn schedules_again_after_previous_task_ran() {
        let el: Arc<dyn EventLoop> = Arc::new(ThreadEventLoop::spawn());
        let deferred = Deferred::new(Arc::clone(&el));
        let count = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&count);
        deferred.schedule(move || {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        std::thread::sleep(Duration::from_millis(50));

        let c2 = Arc::clone(&count);
        deferred.schedule(move || {
            c2.fetch_add(1, Ordering::SeqCst);
        });
        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}

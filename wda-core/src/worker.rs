//! Single-threaded work loop for apartment-bound state.
//!
//! UI Automation requires every element reference to be used from the
//! thread that created it.  [`Worker`] owns one long-lived thread; callers
//! post closures plus a one-shot reply channel and block (with timeout) for
//! the result.  Work items execute strictly in arrival order, one at a
//! time.
//!
//! A panic inside a work item is caught and converted to a system error
//! for that caller only; the worker thread itself stays healthy.  On
//! shutdown, queued items are drained and their callers observe a
//! "shutting down" failure.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::errors::WdaError;
use crate::wait::CancelToken;

/// Interval at which a blocked caller re-checks its cancellation token.
const REPLY_POLL: Duration = Duration::from_millis(50);

/// State constructed on, and owned by, the worker thread.
pub trait WorkerContext: Sized {
    fn create() -> Result<Self, WdaError>;
}

type Job<C> = Box<dyn FnOnce(&mut C) + Send + 'static>;

enum Message<C> {
    Job(Job<C>),
    Shutdown,
}

/// Handle to a single-threaded worker.
///
/// Cloneable submission is not needed; services share the worker behind an
/// `Arc`.  Dropping the last handle stops the thread.
///
/// `tx` is only `None` mid-drop: the sender must disconnect before the
/// thread is joined, otherwise a full inbox could leave the loop blocked
/// on a `Shutdown` message that never fits.
pub struct Worker<C: WorkerContext> {
    tx: Option<Sender<Message<C>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl<C: WorkerContext + 'static> Worker<C> {
    /// Start the worker thread and wait until its context exists.
    ///
    /// `capacity` bounds the inbox; submitters block (with their own
    /// timeout) when it is full.
    pub fn spawn(name: &str, capacity: usize) -> Result<Self, WdaError> {
        let (tx, rx) = bounded::<Message<C>>(capacity.max(1));
        let (ready_tx, ready_rx) = bounded::<Result<(), WdaError>>(1);

        let thread = std::thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || run_loop::<C>(rx, ready_tx))
            .map_err(|e| WdaError::SystemError(format!("failed to spawn worker thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                tx: Some(tx),
                thread: Mutex::new(Some(thread)),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(WdaError::SystemError(
                "worker thread exited before initialising".into(),
            )),
        }
    }

    /// Post a closure and block for its result.
    ///
    /// The caller re-checks `cancel` while waiting; a cancelled caller
    /// returns immediately and the (already queued) work item's eventual
    /// reply is discarded.
    pub fn submit<T, F>(
        &self,
        timeout: Duration,
        cancel: &CancelToken,
        f: F,
    ) -> Result<T, WdaError>
    where
        T: Send + 'static,
        F: FnOnce(&mut C) -> Result<T, WdaError> + Send + 'static,
    {
        cancel.check("worker submission")?;

        let deadline = Instant::now() + timeout;
        let (reply_tx, reply_rx) = bounded::<Result<T, WdaError>>(1);

        let job: Job<C> = Box::new(move |ctx| {
            let outcome = catch_unwind(AssertUnwindSafe(|| f(ctx))).unwrap_or_else(|_| {
                log::error!("work item panicked; worker continues");
                Err(WdaError::SystemError(
                    "internal error while executing the operation".into(),
                ))
            });
            // A disconnected reply means the caller gave up; nothing to do.
            let _ = reply_tx.send(outcome);
        });

        let Some(tx) = self.tx.as_ref() else {
            return Err(WdaError::SystemError(
                "automation worker is shutting down".into(),
            ));
        };
        tx.send_timeout(Message::Job(job), timeout)
            .map_err(|e| match e {
                crossbeam_channel::SendTimeoutError::Timeout(_) => WdaError::Timeout(format!(
                    "worker inbox full for {} ms",
                    timeout.as_millis()
                )),
                crossbeam_channel::SendTimeoutError::Disconnected(_) => {
                    WdaError::SystemError("automation worker is shutting down".into())
                }
            })?;

        loop {
            cancel.check("worker reply wait")?;

            let now = Instant::now();
            if now >= deadline {
                return Err(WdaError::Timeout(format!(
                    "no reply from worker within {} ms",
                    timeout.as_millis()
                )));
            }

            match reply_rx.recv_timeout((deadline - now).min(REPLY_POLL)) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(WdaError::SystemError(
                        "automation worker is shutting down".into(),
                    ))
                }
            }
        }
    }
}

impl<C: WorkerContext> Drop for Worker<C> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            // Best-effort fast exit; a full inbox is fine because dropping
            // the sender disconnects the channel, which ends `rx.iter()`
            // once the queued jobs are drained.
            let _ = tx.try_send(Message::Shutdown);
            drop(tx);
        }
        if let Some(thread) = self.thread.lock().take() {
            let _ = thread.join();
        }
    }
}

fn run_loop<C: WorkerContext>(rx: Receiver<Message<C>>, ready_tx: Sender<Result<(), WdaError>>) {
    let mut ctx = match C::create() {
        Ok(ctx) => {
            let _ = ready_tx.send(Ok(()));
            ctx
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    for message in rx.iter() {
        match message {
            Message::Job(job) => job(&mut ctx),
            Message::Shutdown => break,
        }
    }

    // Fail fast for anything still queued: dropping a job drops its reply
    // sender, which the blocked caller observes as a shutdown failure.
    while let Ok(message) = rx.try_recv() {
        drop(message);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct CounterCtx {
        value: u64,
    }

    impl WorkerContext for CounterCtx {
        fn create() -> Result<Self, WdaError> {
            Ok(Self { value: 0 })
        }
    }

    fn worker() -> Worker<CounterCtx> {
        Worker::spawn("test-worker", 8).unwrap()
    }

    #[test]
    fn submit_returns_closure_result() {
        let w = worker();
        let cancel = CancelToken::new();
        let result = w
            .submit(Duration::from_secs(1), &cancel, |ctx| {
                ctx.value += 1;
                Ok(ctx.value)
            })
            .unwrap();
        assert_eq!(result, 1);
    }

    #[test]
    fn items_are_serialized_in_arrival_order() {
        let w = worker();
        let cancel = CancelToken::new();
        for expected in 1..=10u64 {
            let got = w
                .submit(Duration::from_secs(1), &cancel, move |ctx| {
                    ctx.value += 1;
                    Ok(ctx.value)
                })
                .unwrap();
            assert_eq!(got, expected);
        }
    }

    #[test]
    fn panic_is_isolated_to_one_item() {
        let w = worker();
        let cancel = CancelToken::new();

        let result: Result<(), _> = w.submit(Duration::from_secs(1), &cancel, |_ctx| {
            panic!("boom");
        });
        assert!(matches!(result, Err(WdaError::SystemError(_))));

        // The worker is still alive and the context survived.
        let next = w
            .submit(Duration::from_secs(1), &cancel, |ctx| {
                ctx.value += 1;
                Ok(ctx.value)
            })
            .unwrap();
        assert_eq!(next, 1);
    }

    #[test]
    fn slow_item_times_out_for_the_caller() {
        let w = worker();
        let cancel = CancelToken::new();
        let result: Result<(), _> = w.submit(Duration::from_millis(50), &cancel, |_ctx| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        });
        assert!(matches!(result, Err(WdaError::Timeout(_))));
    }

    #[test]
    fn cancelled_caller_stops_waiting() {
        let w = worker();
        let cancel = CancelToken::new();
        cancel.cancel();
        let result: Result<(), _> =
            w.submit(Duration::from_secs(5), &cancel, |_ctx| Ok(()));
        assert!(matches!(result, Err(WdaError::Cancelled(_))));
    }

    #[test]
    fn drop_completes_with_a_full_inbox() {
        let w: Worker<CounterCtx> = Worker::spawn("test-worker-full", 1).unwrap();
        let cancel = CancelToken::new();

        // Occupy the worker with a slow job (caller gives up quickly)...
        let _: Result<(), _> = w.submit(Duration::from_millis(10), &cancel, |_ctx| {
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        });
        // ...and fill the single inbox slot with a queued job.
        let _: Result<(), _> = w.submit(Duration::from_millis(10), &cancel, |_ctx| Ok(()));

        // Shutdown cannot be enqueued; dropping the sender must still let
        // the worker drain and exit instead of deadlocking the join.
        drop(w);
    }

    #[test]
    fn error_results_pass_through() {
        let w = worker();
        let cancel = CancelToken::new();
        let result: Result<(), _> = w.submit(Duration::from_secs(1), &cancel, |_ctx| {
            Err(WdaError::ElementNotFound("nothing here".into()))
        });
        assert!(matches!(result, Err(WdaError::ElementNotFound(_))));
    }
}

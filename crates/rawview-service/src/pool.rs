//! Fixed-size pool of decode threads with a FIFO request queue.
//!
//! Each thread owns a job channel and runs one request at a time. The pool
//! keeps all bookkeeping under a single lock: which worker is busy with which
//! request, the queue of requests waiting for a worker, and the completion
//! channel of every outstanding request. When a worker reports back, the
//! result is matched to its request by id, the worker is freed, and the next
//! queued request is assigned, all in the same critical section, so no
//! worker sits idle while the queue is non-empty.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use rawview_core::{DecodeError, ImageKind};
use tokio::sync::oneshot;
use tracing::{debug, error, trace, warn};

use crate::worker::{DecodeResult, DecodeWorker};

/// Correlates a worker response with the request that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

struct DecodeJob {
    id: RequestId,
    bytes: Vec<u8>,
    kind: ImageKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerStatus {
    Available,
    Busy(RequestId),
    /// The thread's channel is closed; it will never take work again.
    Gone,
}

struct WorkerSlot {
    status: WorkerStatus,
    jobs: Option<Sender<DecodeJob>>,
}

#[derive(Default)]
struct PoolState {
    workers: Vec<WorkerSlot>,
    queue: VecDeque<DecodeJob>,
    callbacks: HashMap<RequestId, oneshot::Sender<DecodeResult>>,
    next_id: u64,
    stopped: bool,
}

impl PoolState {
    fn next_request_id(&mut self) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Hand queued requests to available workers, oldest first.
    ///
    /// Returns requests that can never run because every worker is gone.
    fn assign_queued(&mut self) -> Vec<(oneshot::Sender<DecodeResult>, DecodeError)> {
        let mut failed = Vec::new();

        while !self.queue.is_empty() {
            let Some(index) = self
                .workers
                .iter()
                .position(|w| w.status == WorkerStatus::Available)
            else {
                break;
            };
            let Some(job) = self.queue.pop_front() else {
                break;
            };

            let id = job.id;
            let slot = &mut self.workers[index];
            let sent = match &slot.jobs {
                Some(tx) => tx.send(job).map_err(|e| e.into_inner()),
                None => Err(job),
            };

            match sent {
                Ok(()) => {
                    trace!(worker = index, request = id.0, "Assigned decode request");
                    slot.status = WorkerStatus::Busy(id);
                }
                Err(job) => {
                    error!(worker = index, "Decode worker thread is gone");
                    slot.status = WorkerStatus::Gone;
                    slot.jobs = None;
                    self.queue.push_front(job);
                }
            }
        }

        if !self.queue.is_empty() && self.workers.iter().all(|w| w.status == WorkerStatus::Gone) {
            for job in self.queue.drain(..) {
                if let Some(callback) = self.callbacks.remove(&job.id) {
                    failed.push((
                        callback,
                        DecodeError::WorkerFault("no decode workers left".to_string()),
                    ));
                }
            }
        }

        failed
    }
}

struct PoolShared {
    state: Mutex<PoolState>,
}

impl PoolShared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver a worker's result and move the queue along.
    fn settle(&self, worker: usize, id: RequestId, result: DecodeResult) {
        let (callback, failed) = {
            let mut state = self.lock();
            let callback = state.callbacks.remove(&id);
            if let Some(slot) = state.workers.get_mut(worker) {
                if slot.status == WorkerStatus::Busy(id) {
                    slot.status = WorkerStatus::Available;
                }
            }
            let failed = state.assign_queued();
            (callback, failed)
        };

        match callback {
            Some(callback) => {
                if callback.send(result).is_err() {
                    trace!(request = id.0, "Decode result dropped, requester went away");
                }
            }
            None => warn!(worker, request = id.0, "Decode response for unknown request"),
        }
        fail_all(failed);
    }
}

fn fail_all(failed: Vec<(oneshot::Sender<DecodeResult>, DecodeError)>) {
    for (callback, err) in failed {
        let _ = callback.send(Err(err));
    }
}

/// Bounded pool of decode threads.
///
/// Requests are served in submission order. A failed or panicking decode is
/// delivered to its own requester only; the worker that ran it goes straight
/// back into rotation.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Start `count` threads (at least one), each running a clone of `worker`.
    pub fn start(count: usize, worker: DecodeWorker) -> std::io::Result<Self> {
        let count = count.max(1);
        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState::default()),
        });

        let mut slots = Vec::with_capacity(count);
        let mut handles = Vec::with_capacity(count);
        for index in 0..count {
            let (tx, rx) = unbounded();
            let weak = Arc::downgrade(&shared);
            let worker = worker.clone();
            let handle = std::thread::Builder::new()
                .name(format!("rawview-decode-{index}"))
                .spawn(move || run_worker(index, worker, rx, weak))?;
            slots.push(WorkerSlot {
                status: WorkerStatus::Available,
                jobs: Some(tx),
            });
            handles.push(handle);
        }
        shared.lock().workers = slots;

        debug!(workers = count, "Decode worker pool started");
        Ok(Self {
            shared,
            handles: Mutex::new(handles),
        })
    }

    /// Queue a request and return a future for its result.
    ///
    /// The request joins the queue immediately, so submission order is the
    /// order of `dispatch` calls, not of the first poll. The returned future
    /// does not borrow the pool; dropping it abandons the result but never
    /// the work.
    pub fn dispatch(
        &self,
        bytes: Vec<u8>,
        kind: ImageKind,
    ) -> impl Future<Output = DecodeResult> + Send + 'static {
        let (tx, rx) = oneshot::channel();

        let failed = {
            let mut state = self.shared.lock();
            if state.stopped {
                vec![(tx, DecodeError::ServiceStopped)]
            } else {
                let id = state.next_request_id();
                trace!(request = id.0, ?kind, "Queued decode request");
                state.callbacks.insert(id, tx);
                state.queue.push_back(DecodeJob { id, bytes, kind });
                state.assign_queued()
            }
        };
        fail_all(failed);

        async move { rx.await.unwrap_or(Err(DecodeError::ServiceStopped)) }
    }

    /// Live workers; zero once the pool has been stopped.
    pub fn worker_count(&self) -> usize {
        let state = self.shared.lock();
        if state.stopped {
            return 0;
        }
        state.workers.iter().filter(|w| w.status != WorkerStatus::Gone).count()
    }

    pub fn available_workers(&self) -> usize {
        let state = self.shared.lock();
        if state.stopped {
            return 0;
        }
        state.workers.iter().filter(|w| w.status == WorkerStatus::Available).count()
    }

    pub fn queued_requests(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Requests submitted but not yet answered, queued or running.
    pub fn outstanding_requests(&self) -> usize {
        self.shared.lock().callbacks.len()
    }

    /// Stop accepting work, then wait for the threads to finish.
    ///
    /// Queued requests fail with [`DecodeError::ServiceStopped`]; requests
    /// already running complete normally. Blocks the calling thread.
    pub fn shutdown(&self) {
        self.signal_stop();

        let handles = std::mem::take(
            &mut *self
                .handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            if handle.join().is_err() {
                error!("Decode worker thread panicked outside a request");
            }
        }
        debug!("Decode worker pool stopped");
    }

    fn signal_stop(&self) {
        let failed = {
            let mut state = self.shared.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
            for slot in &mut state.workers {
                slot.jobs = None;
            }
            let queued: Vec<RequestId> = state.queue.drain(..).map(|job| job.id).collect();
            queued
                .into_iter()
                .filter_map(|id| state.callbacks.remove(&id))
                .map(|callback| (callback, DecodeError::ServiceStopped))
                .collect::<Vec<_>>()
        };
        fail_all(failed);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

fn run_worker(
    index: usize,
    worker: DecodeWorker,
    jobs: Receiver<DecodeJob>,
    pool: Weak<PoolShared>,
) {
    trace!(worker = index, "Decode worker running");

    while let Ok(DecodeJob { id, bytes, kind }) = jobs.recv() {
        let result = worker.process(&bytes, kind);
        drop(bytes);

        if let Err(e) = &result {
            debug!(worker = index, request = id.0, %e, "Decode request failed");
        }

        let Some(pool) = pool.upgrade() else {
            break;
        };
        pool.settle(index, id, result);
    }

    trace!(worker = index, "Decode worker exiting");
}

//! Background timeline computation with at most one job in flight
//!
//! Events arrive in batches while a program runs. Recomputing on every batch
//! would queue up stale work, so the worker keeps one computation running
//! and remembers only that something newer is waiting:
//!
//! ```text
//!            push                      push
//!   Idle ──────────► Computing ──────────────► ComputingWithPending
//!    ▲                 │   ▲                          │  │ push (stays)
//!    │   done          │   │     done: dispatch the   │  │
//!    └─────────────────┘   └──── latest snapshot ─────┘◄─┘
//! ```
//!
//! Each dispatch sends an immutable snapshot of everything accumulated so
//! far. No computation is cancelled; a finished result whose successor is
//! already running is still delivered, flagged `superseded`.

use crate::config::TimelineConfig;
use crate::error::{Result, TimelineError};
use crate::event::RawEvent;
use crate::pipeline::{compute_timeline, ComputedTimeline};
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Computing,
    ComputingWithPending,
}

/// One finished computation
#[derive(Debug)]
pub struct TimelineUpdate {
    /// Dispatch number, starting at 1
    pub generation: u64,

    /// Number of events the computation saw
    pub event_count: usize,

    /// A newer computation was dispatched before this one was delivered
    pub superseded: bool,

    pub outcome: Result<ComputedTimeline>,
}

struct Job {
    generation: u64,
    events: Arc<Vec<RawEvent>>,
}

struct Finished {
    generation: u64,
    event_count: usize,
    outcome: Result<ComputedTimeline>,
}

/// Accumulates events and recomputes the timeline on a worker thread
pub struct TimelineWorker {
    buffer: Vec<RawEvent>,
    state: WorkerState,
    generation: u64,
    job_tx: Option<Sender<Job>>,
    done_rx: Receiver<Finished>,
    handle: Option<JoinHandle<()>>,
}

impl TimelineWorker {
    /// Spawn the worker thread
    pub fn new(config: TimelineConfig) -> Result<Self> {
        config.validate().map_err(TimelineError::Config)?;

        let (job_tx, job_rx) = channel::unbounded::<Job>();
        let (done_tx, done_rx) = channel::unbounded::<Finished>();

        let handle = thread::Builder::new()
            .name("timeline-worker".to_string())
            .spawn(move || Self::worker_loop(job_rx, done_tx, config))?;

        Ok(Self {
            buffer: Vec::new(),
            state: WorkerState::Idle,
            generation: 0,
            job_tx: Some(job_tx),
            done_rx,
            handle: Some(handle),
        })
    }

    fn worker_loop(jobs: Receiver<Job>, done: Sender<Finished>, config: TimelineConfig) {
        for job in jobs {
            tracing::debug!(
                generation = job.generation,
                events = job.events.len(),
                "Computing timeline"
            );
            let outcome = compute_timeline(&job.events, &config);
            if let Err(err) = &outcome {
                tracing::warn!(generation = job.generation, error = %err, "Timeline computation failed");
            }

            let finished = Finished {
                generation: job.generation,
                event_count: job.events.len(),
                outcome,
            };
            if done.send(finished).is_err() {
                break;
            }
        }
        tracing::debug!("Timeline worker stopped");
    }

    /// Append a batch and start a computation if none is running
    pub fn push_events<I>(&mut self, batch: I) -> Result<()>
    where
        I: IntoIterator<Item = RawEvent>,
    {
        self.buffer.extend(batch);

        match self.state {
            WorkerState::Idle => {
                self.dispatch()?;
                self.state = WorkerState::Computing;
            }
            WorkerState::Computing | WorkerState::ComputingWithPending => {
                self.state = WorkerState::ComputingWithPending;
            }
        }
        Ok(())
    }

    fn dispatch(&mut self) -> Result<()> {
        let tx = self.job_tx.as_ref().ok_or(TimelineError::WorkerDisconnected)?;

        self.generation += 1;
        let job = Job {
            generation: self.generation,
            events: Arc::new(self.buffer.clone()),
        };
        tracing::debug!(generation = self.generation, events = self.buffer.len(), "Dispatching snapshot");

        tx.send(job).map_err(|_| TimelineError::WorkerDisconnected)
    }

    fn complete(&mut self, finished: Finished) -> Result<TimelineUpdate> {
        let superseded = self.state == WorkerState::ComputingWithPending;
        if superseded {
            self.dispatch()?;
            self.state = WorkerState::Computing;
        } else {
            self.state = WorkerState::Idle;
        }

        Ok(TimelineUpdate {
            generation: finished.generation,
            event_count: finished.event_count,
            superseded,
            outcome: finished.outcome,
        })
    }

    /// Block until the running computation finishes
    ///
    /// Returns `None` when nothing is running.
    pub fn next_update(&mut self) -> Result<Option<TimelineUpdate>> {
        if self.state == WorkerState::Idle {
            return Ok(None);
        }

        let finished = self
            .done_rx
            .recv()
            .map_err(|_| TimelineError::WorkerDisconnected)?;
        self.complete(finished).map(Some)
    }

    /// Deliver a finished computation if there is one, without blocking
    pub fn try_next_update(&mut self) -> Result<Option<TimelineUpdate>> {
        if self.state == WorkerState::Idle {
            return Ok(None);
        }

        match self.done_rx.try_recv() {
            Ok(finished) => self.complete(finished).map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TimelineError::WorkerDisconnected),
        }
    }

    /// Wait until every accumulated event has been computed
    ///
    /// Returns the last update, which covers the whole buffer.
    pub fn finish(&mut self) -> Result<Option<TimelineUpdate>> {
        let mut last = None;
        while let Some(update) = self.next_update()? {
            last = Some(update);
        }
        Ok(last)
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Events accumulated so far
    pub fn event_count(&self) -> usize {
        self.buffer.len()
    }

    /// Number of computations dispatched so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stop the worker thread after its current computation
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.job_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Timeline worker thread panicked");
            }
        }
    }
}

impl Drop for TimelineWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

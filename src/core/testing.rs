//! In-memory [`Runner`] driven by the test body.
//!
//! Each `start` plays one run: it takes a fresh pid, forwards the lines the
//! test pushes and reports the exit the test asks for. A `stop` (or the
//! shutdown token) ends the run with a clean exit.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::core::runner::{RunOutcome, Runner, RunnerPipes};
use crate::error::RunnerError;

pub(crate) enum Step {
    Line(String),
    Exit(RunOutcome),
}

/// Test-side handle of a [`ScriptedRunner`].
#[derive(Clone)]
pub(crate) struct Script {
    tx: mpsc::UnboundedSender<Step>,
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

impl Script {
    pub(crate) fn line(&self, line: &str) {
        let _ = self.tx.send(Step::Line(line.to_string()));
    }

    pub(crate) fn exit(&self) {
        let _ = self.tx.send(Step::Exit(Ok(())));
    }

    pub(crate) fn crash(&self, name: &str) {
        let _ = self.tx.send(Step::Exit(Err(RunnerError::Exited {
            name: name.to_string(),
            status: "exit status: 1".into(),
        })));
    }

    pub(crate) fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

pub(crate) struct ScriptedRunner {
    pipes: RunnerPipes,
    steps: Mutex<mpsc::UnboundedReceiver<Step>>,
    stop: Notify,
    active: AtomicBool,
    next_pid: AtomicU32,
    pid: watch::Sender<u32>,
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

impl ScriptedRunner {
    pub(crate) fn new(pipes: RunnerPipes) -> (Arc<Self>, Script) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (pid, _) = watch::channel(0);
        let starts = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));
        let runner = Arc::new(Self {
            pipes,
            steps: Mutex::new(rx),
            stop: Notify::new(),
            active: AtomicBool::new(false),
            next_pid: AtomicU32::new(1000),
            pid,
            starts: Arc::clone(&starts),
            stops: Arc::clone(&stops),
        });
        (runner, Script { tx, starts, stops })
    }
}

#[async_trait]
impl Runner for ScriptedRunner {
    async fn start(&self, ctx: CancellationToken) -> Result<(), RunnerError> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(RunnerError::AlreadyRunning {
                name: "scripted".into(),
            });
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.pid
            .send_replace(self.next_pid.fetch_add(1, Ordering::SeqCst));

        let mut steps = self.steps.lock().await;
        let outcome = loop {
            tokio::select! {
                step = steps.recv() => match step {
                    Some(Step::Line(line)) => {
                        let _ = self.pipes.lines.send(line).await;
                    }
                    Some(Step::Exit(outcome)) => break outcome,
                    None => break Ok(()),
                },
                _ = self.stop.notified() => break Ok(()),
                _ = ctx.cancelled() => break Ok(()),
            }
        };
        drop(steps);

        self.active.store(false, Ordering::SeqCst);
        self.pid.send_replace(0);
        let _ = self.pipes.done.send(outcome).await;
        Ok(())
    }

    fn stop(&self) -> Result<(), RunnerError> {
        if self.active.load(Ordering::SeqCst) {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.stop.notify_one();
        }
        Ok(())
    }

    fn pid(&self) -> u32 {
        *self.pid.borrow()
    }

    fn watch_pid(&self) -> watch::Receiver<u32> {
        self.pid.subscribe()
    }
}

//! Background poll scheduling.
//!
//! Runs on the tokio runtime, independent of the console's event loop.  A
//! fixed-interval ticker starts a cycle (the first one immediately), and
//! [`PollHandle::check_now`] starts an extra one on demand.  Each cycle is
//! its own task, so a manual check never waits for a slow scheduled cycle;
//! overlapping cycles are made safe by the engine's per-feed lock.
//!
//! ## For contributors
//!
//! Progress is reported as [`PollMsg`] values over a std [`mpsc`] channel so
//! the synchronous UI loop can drain it with `try_recv`.  If the receiver is
//! gone (headless mode) the messages are simply dropped.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc as async_mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::engine::{CycleReport, PollingEngine};

/// Why a cycle ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Scheduled,
    Manual,
}

/// Messages sent from the scheduler to whoever is listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollMsg {
    Started(Trigger),
    Finished(Trigger, CycleReport),
}

/// Requests on-demand cycles from the running scheduler.
#[derive(Debug, Clone)]
pub struct PollHandle {
    manual: async_mpsc::UnboundedSender<()>,
}

impl PollHandle {
    /// Ask for an immediate cycle.  Returns `false` if the scheduler stopped.
    pub fn check_now(&self) -> bool {
        self.manual.send(()).is_ok()
    }
}

/// Spawn the scheduler on `runtime`.
pub fn spawn<M>(
    runtime: &Handle,
    engine: Arc<PollingEngine>,
    interval: Duration,
    events: mpsc::Sender<M>,
) -> PollHandle
where
    M: From<PollMsg> + Send + 'static,
{
    let (manual_tx, mut manual_rx) = async_mpsc::unbounded_channel::<()>();
    let spawner = runtime.clone();

    runtime.spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), "poll scheduler started");

        let mut manual_open = true;

        loop {
            let trigger = tokio::select! {
                _ = ticker.tick() => Trigger::Scheduled,
                request = manual_rx.recv(), if manual_open => match request {
                    Some(()) => Trigger::Manual,
                    None => {
                        debug!("all poll handles dropped, only the ticker remains");
                        manual_open = false;
                        continue;
                    }
                },
            };

            let engine = Arc::clone(&engine);
            let events = events.clone();
            spawner.spawn(run_cycle(engine, trigger, events));
        }
    });

    PollHandle { manual: manual_tx }
}

async fn run_cycle<M>(engine: Arc<PollingEngine>, trigger: Trigger, events: mpsc::Sender<M>)
where
    M: From<PollMsg> + Send + 'static,
{
    info!(?trigger, "poll cycle triggered");
    let _ = events.send(PollMsg::Started(trigger).into());
    let report = engine.run_poll_cycle().await;
    let _ = events.send(PollMsg::Finished(trigger, report).into());
}

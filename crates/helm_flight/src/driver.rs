//! The tick driver: runs one flight on its own tokio task.
//!
//! The driver owns the [`Flight`]. External requests arrive as commands on
//! an mpsc channel and are applied between ticks, so every request sees a
//! tick boundary. Each post-tick [`ChangeSet`] goes to the hub's dispatcher
//! task, which delivers it while the next tick runs.

use std::sync::Arc;
use std::time::Duration;

use helm_ecs::{ComponentQuery, EntityView, Mutation, MutationOutcome};
use helm_notify::{ChangeSet, Filter, NotificationHub, Subscription, SubscriptionId};
use helm_physics::TeardownReport;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::TickMode;
use crate::error::FlightError;
use crate::flight::{Flight, FlightId, FlightSnapshot};

const COMMAND_BUFFER: usize = 256;

enum Command {
    Query(ComponentQuery, oneshot::Sender<Result<Vec<EntityView>, FlightError>>),
    Mutate(Mutation, oneshot::Sender<Result<MutationOutcome, FlightError>>),
    Snapshot(oneshot::Sender<Result<FlightSnapshot, FlightError>>),
    Status(oneshot::Sender<FlightStatus>),
    Stop(oneshot::Sender<TeardownReport>),
}

/// A flight's state as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightStatus {
    pub id: FlightId,
    pub name: String,
    pub tick: u64,
    pub entities: usize,
    /// `false` once the tick limit has been reached.
    pub running: bool,
    /// Isolated per-entity faults since the flight started.
    pub faults: u64,
}

/// Cloneable handle to a driven flight.
#[derive(Clone)]
pub struct FlightHandle {
    id: FlightId,
    name: String,
    commands: mpsc::Sender<Command>,
    hub: Arc<NotificationHub>,
}

impl FlightHandle {
    /// The flight's id.
    pub fn id(&self) -> FlightId {
        self.id
    }

    /// The flight's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, FlightError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| FlightError::Stopped)?;
        rx.await.map_err(|_| FlightError::Stopped)
    }

    /// Answer `query` at the next tick boundary.
    pub async fn query(&self, query: ComponentQuery) -> Result<Vec<EntityView>, FlightError> {
        self.request(|tx| Command::Query(query, tx)).await?
    }

    /// Apply `mutation` at the next tick boundary.
    pub async fn mutate(&self, mutation: Mutation) -> Result<MutationOutcome, FlightError> {
        self.request(|tx| Command::Mutate(mutation, tx)).await?
    }

    /// Capture the flight between ticks.
    pub async fn snapshot(&self) -> Result<FlightSnapshot, FlightError> {
        self.request(Command::Snapshot).await?
    }

    /// Tick, entity count, running state and fault count.
    pub async fn status(&self) -> Result<FlightStatus, FlightError> {
        self.request(Command::Status).await
    }

    /// Stop at the next tick boundary and tear the flight down.
    pub async fn stop(&self) -> Result<TeardownReport, FlightError> {
        self.request(Command::Stop).await
    }

    /// Register a callback on the flight's hub.
    pub fn subscribe(
        &self,
        filter: Filter,
        callback: impl Fn(&ChangeSet) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.hub.subscribe(filter, callback)
    }

    /// Register a mailbox on the flight's hub.
    pub fn subscribe_channel(&self, filter: Filter) -> Subscription {
        self.hub.subscribe_channel(filter)
    }

    /// Drop a subscription. Returns `false` if it was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.hub.unsubscribe(id)
    }
}

impl std::fmt::Debug for FlightHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

enum Event {
    Tick,
    Command(Option<Command>),
}

/// Owns one flight and runs it on its own task.
pub struct FlightDriver {
    id: FlightId,
    flight: Flight,
    commands: mpsc::Receiver<Command>,
    changes: mpsc::Sender<ChangeSet>,
    dispatcher: JoinHandle<()>,
    running: bool,
    faults: u64,
}

impl FlightDriver {
    /// Move `flight` onto a new task and start ticking. Must be called from
    /// within a tokio runtime.
    pub fn spawn(id: FlightId, flight: Flight) -> FlightHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (change_tx, change_rx) = mpsc::channel(flight.config().channel_capacity.max(1));
        let hub = Arc::clone(flight.hub());
        let dispatcher = Arc::clone(&hub).spawn_dispatcher(change_rx);
        let handle = FlightHandle {
            id,
            name: flight.name().to_string(),
            commands: command_tx,
            hub,
        };
        let driver = FlightDriver {
            id,
            flight,
            commands: command_rx,
            changes: change_tx,
            dispatcher,
            running: true,
            faults: 0,
        };
        tokio::spawn(driver.run());
        handle
    }

    async fn run(mut self) {
        let tick = self.flight.config().tick.clone();
        let period = tick.tick_duration();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = Instant::now();
        info!(
            flight_id = %self.id,
            flight = %self.flight.name(),
            tick_rate = tick.tick_rate,
            max_ticks = tick.max_ticks,
            "flight driver started"
        );

        loop {
            let event = tokio::select! {
                _ = interval.tick(), if self.running => Event::Tick,
                command = self.commands.recv() => Event::Command(command),
            };
            match event {
                Event::Tick => {
                    let now = Instant::now();
                    let elapsed = match tick.mode {
                        TickMode::Fixed => period,
                        TickMode::Variable => {
                            let measured = now.duration_since(last);
                            let bounded = tick.clamp(measured);
                            if bounded < measured {
                                warn!(
                                    flight_id = %self.id,
                                    elapsed_ms = measured.as_millis() as u64,
                                    max_elapsed_ms = bounded.as_millis() as u64,
                                    "wall-clock delta clamped"
                                );
                            }
                            bounded
                        }
                    };
                    last = now;
                    self.step(elapsed, period).await;
                    if tick.max_ticks > 0 && self.flight.tick_count() >= tick.max_ticks {
                        self.running = false;
                        info!(flight_id = %self.id, ticks = self.flight.tick_count(), "tick limit reached");
                    }
                }
                Event::Command(Some(Command::Stop(reply))) => {
                    let report = self.finish().await;
                    let _ = reply.send(report);
                    return;
                }
                Event::Command(Some(command)) => self.handle(command),
                Event::Command(None) => {
                    debug!(flight_id = %self.id, "every handle dropped");
                    self.finish().await;
                    return;
                }
            }
        }
    }

    async fn step(&mut self, elapsed: Duration, budget: Duration) {
        let started = std::time::Instant::now();
        let report = self.flight.advance(elapsed);
        self.faults += report.faults.len() as u64;
        let set = self.flight.take_change_set();
        let took = started.elapsed();
        if took > budget {
            warn!(
                flight_id = %self.id,
                tick_id = report.tick,
                elapsed_ms = took.as_millis() as u64,
                budget_ms = budget.as_millis() as u64,
                "tick exceeded time budget"
            );
        }
        self.publish(set).await;
    }

    async fn publish(&mut self, set: Result<ChangeSet, FlightError>) {
        match set {
            Ok(set) if set.is_empty() => {}
            Ok(set) => {
                if self.changes.send(set).await.is_err() {
                    warn!(flight_id = %self.id, "notification dispatcher is gone");
                }
            }
            Err(e) => error!(flight_id = %self.id, error = %e, "could not capture change set"),
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Query(query, reply) => {
                let _ = reply.send(self.flight.query(&query));
            }
            Command::Mutate(mutation, reply) => {
                let _ = reply.send(self.flight.mutate(mutation));
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.flight.snapshot());
            }
            Command::Status(reply) => {
                let _ = reply.send(FlightStatus {
                    id: self.id,
                    name: self.flight.name().to_string(),
                    tick: self.flight.tick_count(),
                    entities: self.flight.world().entity_count(),
                    running: self.running,
                    faults: self.faults,
                });
            }
            Command::Stop(_) => {}
        }
    }

    /// Deliver what is still pending, then tear the flight down.
    async fn finish(mut self) -> TeardownReport {
        let pending = self.flight.take_change_set();
        self.publish(pending).await;
        drop(self.changes);
        if let Err(e) = self.dispatcher.await {
            error!(flight_id = %self.id, error = %e, "notification dispatcher failed");
        }
        let report = self.flight.teardown();
        info!(flight_id = %self.id, "flight driver stopped");
        report
    }
}

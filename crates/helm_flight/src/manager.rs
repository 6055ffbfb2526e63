//! Many isolated flights side by side.

use std::sync::Arc;

use dashmap::DashMap;
use helm_component::ComponentRegistry;
use helm_physics::TeardownReport;
use tracing::{info, warn};

use crate::config::FlightConfig;
use crate::driver::{FlightDriver, FlightHandle, FlightStatus};
use crate::error::FlightError;
use crate::flight::{Flight, FlightId, FlightSnapshot};

/// Registry of running flights. Each flight has its own store, scheduler,
/// physics bridge and hub; the manager shares only the component registry.
pub struct FlightManager {
    registry: Arc<ComponentRegistry>,
    flights: DashMap<FlightId, FlightHandle>,
}

impl FlightManager {
    /// An empty manager whose flights accept the types in `registry`.
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self {
            registry,
            flights: DashMap::new(),
        }
    }

    /// The registry shared by every flight.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Start an empty flight on its own task.
    pub fn create(&self, config: FlightConfig) -> Result<FlightHandle, FlightError> {
        let flight = Flight::new(config, Arc::clone(&self.registry))?;
        Ok(self.launch(flight))
    }

    /// Start a flight from a snapshot.
    pub fn restore(
        &self,
        config: FlightConfig,
        snapshot: FlightSnapshot,
    ) -> Result<FlightHandle, FlightError> {
        let flight = Flight::restore(config, Arc::clone(&self.registry), snapshot)?;
        Ok(self.launch(flight))
    }

    fn launch(&self, flight: Flight) -> FlightHandle {
        let id = FlightId::new();
        let name = flight.name().to_string();
        let handle = FlightDriver::spawn(id, flight);
        self.flights.insert(id, handle.clone());
        info!(flight_id = %id, flight = %name, running = self.flights.len(), "flight launched");
        handle
    }

    /// The handle of a running flight.
    pub fn get(&self, id: FlightId) -> Result<FlightHandle, FlightError> {
        self.flights
            .get(&id)
            .map(|h| h.value().clone())
            .ok_or(FlightError::UnknownFlight(id))
    }

    /// Ids of every flight, sorted.
    pub fn ids(&self) -> Vec<FlightId> {
        let mut ids: Vec<FlightId> = self.flights.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    /// Number of running flights.
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    /// Returns `true` if no flight is running.
    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    /// Status of every flight that still answers.
    pub async fn list(&self) -> Vec<FlightStatus> {
        let handles: Vec<FlightHandle> = self.flights.iter().map(|e| e.value().clone()).collect();
        let mut statuses = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.status().await {
                Ok(status) => statuses.push(status),
                Err(e) => warn!(flight_id = %handle.id(), error = %e, "flight did not report status"),
            }
        }
        statuses.sort_by_key(|s| s.id);
        statuses
    }

    /// Stop one flight at its next tick boundary and forget it.
    pub async fn stop(&self, id: FlightId) -> Result<TeardownReport, FlightError> {
        let (_, handle) = self
            .flights
            .remove(&id)
            .ok_or(FlightError::UnknownFlight(id))?;
        handle.stop().await
    }

    /// Stop every flight, reporting each teardown.
    pub async fn stop_all(&self) -> Vec<(FlightId, Result<TeardownReport, FlightError>)> {
        let mut results = Vec::new();
        for id in self.ids() {
            results.push((id, self.stop(id).await));
        }
        results
    }
}

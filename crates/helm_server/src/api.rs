/// NATS API handler: one wildcard subscription under the prefix, each
/// request routed by subject to a flight through the manager.
///
///   Request/Reply:
///     {prefix}.flight.create   create a flight, optional config overrides
///     {prefix}.flight.stop     stop a flight and release its physics
///     {prefix}.flight.list     status of every flight
///     {prefix}.query           component query against one flight
///     {prefix}.mutate          validated mutation against one flight
///     {prefix}.snapshot        full snapshot of one flight
///     {prefix}.restore         start a flight from a snapshot
///     {prefix}.schema          registered components with their defaults
///
///   Publish (broadcast):
///     {prefix}.events.{flight}.{component}
use std::sync::Arc;

use futures::StreamExt;
use helm_flight::{FlightConfig, FlightHandle, FlightManager};
use helm_net::messages::{
    ApiError, ApiResponse, CreateFlightRequest, FlightCreated, FlightRef, MutateRequest,
    QueryRequest, RestoreRequest,
};
use helm_net::{Codec, NatsConnection, NetError, Operation, Subjects};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::events;

/// Serves the request/reply operations for every flight.
pub struct Api {
    flights: Arc<FlightManager>,
    connection: NatsConnection,
    subjects: Subjects,
    defaults: FlightConfig,
    event_codec: Codec,
}

impl Api {
    /// An API serving `manager` over `connection`.
    pub fn new(
        flights: Arc<FlightManager>,
        connection: NatsConnection,
        subjects: Subjects,
        defaults: FlightConfig,
        event_codec: Codec,
    ) -> Self {
        Self {
            flights,
            connection,
            subjects,
            defaults,
            event_codec,
        }
    }

    /// Handle requests until the subscription closes.
    pub async fn run(&self) -> Result<(), NetError> {
        let subject = self.subjects.requests();
        info!(subject = %subject, "subscribing to API subjects");
        let mut requests = self.connection.subscribe(subject).await?;
        info!("helm-server ready, listening for requests");

        while let Some(msg) = requests.next().await {
            let subject = msg.subject.as_str();
            if self.subjects.is_event(subject) {
                continue;
            }
            let response = match self.subjects.parse(subject) {
                Some(op) => {
                    debug!(op = op.suffix(), "received request");
                    match self.handle(op, &msg.payload).await {
                        Ok(value) => ApiResponse::Ok(value),
                        Err(e) => {
                            debug!(op = op.suffix(), kind = %e.kind, error = %e.message, "request rejected");
                            ApiResponse::Error(e)
                        }
                    }
                }
                None => {
                    let op = self.subjects.suffix_of(subject);
                    warn!(op = %op, "unknown operation");
                    ApiResponse::error(ApiError::new(
                        "unknownOperation",
                        format!("unknown operation: {op}"),
                    ))
                }
            };
            if let Err(e) = self.connection.reply(msg.reply, &response).await {
                error!(error = %e, "failed to publish reply");
            }
        }
        Ok(())
    }

    async fn handle(&self, op: Operation, payload: &[u8]) -> Result<Value, ApiError> {
        match op {
            Operation::FlightCreate => {
                let req: CreateFlightRequest = parse(payload)?;
                to_value(&self.create(&req)?)
            }
            Operation::FlightStop => {
                let req: FlightRef = parse(payload)?;
                let report = self.flights.stop(req.flight).await?;
                info!(flight_id = %req.flight, worlds = report.worlds, bodies = report.bodies, "flight stopped");
                to_value(&report)
            }
            Operation::FlightList => to_value(&self.flights.list().await),
            Operation::Query => {
                let req: QueryRequest = parse(payload)?;
                let views = self.flights.get(req.flight)?.query(req.query).await?;
                to_value(&views)
            }
            Operation::Mutate => {
                let req: MutateRequest = parse(payload)?;
                let outcome = self.flights.get(req.flight)?.mutate(req.mutation).await?;
                to_value(&outcome)
            }
            Operation::Snapshot => {
                let req: FlightRef = parse(payload)?;
                let snapshot = self.flights.get(req.flight)?.snapshot().await?;
                to_value(&snapshot)
            }
            Operation::Restore => {
                let req: RestoreRequest = parse(payload)?;
                let config = req.overrides.apply(&self.defaults);
                let handle = self.flights.restore(config, req.snapshot)?;
                to_value(&self.announce(&handle))
            }
            Operation::Schema => Ok(self.flights.registry().to_json()),
        }
    }

    /// Start a flight from the defaults plus `req` and begin broadcasting
    /// its changes.
    pub fn create(&self, req: &CreateFlightRequest) -> Result<FlightCreated, ApiError> {
        let handle = self.flights.create(req.apply(&self.defaults))?;
        Ok(self.announce(&handle))
    }

    fn announce(&self, handle: &FlightHandle) -> FlightCreated {
        events::forward(
            self.connection.clone(),
            self.subjects.clone(),
            self.event_codec,
            handle,
        );
        FlightCreated {
            flight: handle.id(),
            name: handle.name().to_string(),
        }
    }
}

/// Decode a JSON request body. An empty body reads as `{}`.
fn parse<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ApiError> {
    let payload = if payload.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        payload
    };
    Codec::Json
        .decode(payload)
        .map_err(|e| ApiError::from(&e))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::new("internal", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_reads_as_empty_object() {
        let req: CreateFlightRequest = parse(b"").unwrap();
        assert_eq!(req, CreateFlightRequest::default());
        let req: CreateFlightRequest = parse(b"  \n").unwrap();
        assert_eq!(req.name, None);
    }

    #[test]
    fn test_malformed_body_is_invalid_request() {
        let err = parse::<FlightRef>(b"{\"flight\": 3}").unwrap_err();
        assert_eq!(err.kind, "invalidRequest");
        let err = parse::<FlightRef>(b"not json").unwrap_err();
        assert_eq!(err.kind, "invalidRequest");
    }
}

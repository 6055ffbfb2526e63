//! Request, reply and event payloads.
//!
//! Requests name their flight by id; the rest of each request is the
//! flight-level type it wraps ([`ComponentQuery`], [`Mutation`],
//! [`FlightSnapshot`]), flattened into one JSON object.

use helm_ecs::{ComponentQuery, Mutation};
use helm_flight::{FlightConfig, FlightError, FlightId, FlightSnapshot, TickMode};
use helm_notify::ChangeRecord;
use helm_physics::BackendKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NetError;

// ── Flight lifecycle ────────────────────────────────────────────────────────

/// Overrides applied on top of the server's default flight configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateFlightRequest {
    pub name: Option<String>,
    pub tick_rate: Option<f64>,
    pub max_ticks: Option<u64>,
    pub mode: Option<TickMode>,
    pub physics: Option<BackendKind>,
}

impl CreateFlightRequest {
    /// The defaults with every present override applied.
    pub fn apply(&self, defaults: &FlightConfig) -> FlightConfig {
        let mut config = defaults.clone();
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(rate) = self.tick_rate {
            config.tick.tick_rate = rate;
            config.tick.max_elapsed = config.tick.max_elapsed.max(config.tick.tick_duration());
        }
        if let Some(max) = self.max_ticks {
            config.tick.max_ticks = max;
        }
        if let Some(mode) = self.mode {
            config.tick.mode = mode;
        }
        if let Some(physics) = self.physics {
            config.physics = physics;
        }
        config
    }
}

/// Start a flight from a snapshot, with optional config overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    #[serde(flatten)]
    pub overrides: CreateFlightRequest,
    pub snapshot: FlightSnapshot,
}

/// Names one flight; the body of stop and snapshot requests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlightRef {
    pub flight: FlightId,
}

/// Reply to a create or restore request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightCreated {
    pub flight: FlightId,
    pub name: String,
}

// ── External interfaces ─────────────────────────────────────────────────────

/// Read request addressed to one flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub flight: FlightId,
    #[serde(flatten)]
    pub query: ComponentQuery,
}

/// Write request addressed to one flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutateRequest {
    pub flight: FlightId,
    #[serde(flatten)]
    pub mutation: Mutation,
}

// ── Replies ─────────────────────────────────────────────────────────────────

/// Error body of a failed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Stable machine-readable category, e.g. `validation`.
    pub kind: String,
    pub message: String,
}

impl ApiError {
    /// An error of `kind`.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl From<&FlightError> for ApiError {
    fn from(e: &FlightError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<&NetError> for ApiError {
    fn from(e: &NetError) -> Self {
        Self::new("invalidRequest", e.to_string())
    }
}

/// `{"ok": ..}` or `{"error": {"kind": .., "message": ..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApiResponse {
    Ok(Value),
    Error(ApiError),
}

impl ApiResponse {
    /// Wrap `value`; a value that does not serialise becomes an `internal` error.
    pub fn ok<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => ApiResponse::Ok(v),
            Err(e) => ApiResponse::Error(ApiError::new("internal", e.to_string())),
        }
    }

    /// Wrap an error.
    pub fn error(error: impl Into<ApiError>) -> Self {
        ApiResponse::Error(error.into())
    }

    /// Returns `true` for a success reply.
    pub fn is_ok(&self) -> bool {
        matches!(self, ApiResponse::Ok(_))
    }

    /// The reply as JSON bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|_| b"{}".to_vec())
    }
}

impl<T: Serialize, E: Into<ApiError>> From<Result<T, E>> for ApiResponse {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => ApiResponse::ok(&value),
            Err(e) => ApiResponse::error(e),
        }
    }
}

impl From<FlightError> for ApiError {
    fn from(e: FlightError) -> Self {
        Self::from(&e)
    }
}

impl From<NetError> for ApiError {
    fn from(e: NetError) -> Self {
        Self::from(&e)
    }
}

// ── Events ──────────────────────────────────────────────────────────────────

/// One change, broadcast on `{prefix}.events.{flight}.{component}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub flight: FlightId,
    pub tick: u64,
    #[serde(flatten)]
    pub record: ChangeRecord,
}

#[cfg(test)]
mod tests {
    use helm_component::EntityId;
    use helm_ecs::{ChangeKind, MutationOp, MutationTarget};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_mutate_request_is_one_flat_object() {
        let flight = FlightId::new();
        let req: MutateRequest = serde_json::from_value(json!({
            "flight": flight.to_string(),
            "target": {"entity": 7},
            "op": "update",
            "component": "hull",
            "partial": {"value": 10.0},
        }))
        .unwrap();
        assert_eq!(req.flight, flight);
        assert_eq!(req.mutation.target, MutationTarget::Entity(EntityId(7)));
        assert_eq!(
            req.mutation.op,
            MutationOp::Update {
                component: "hull".into(),
                partial: json!({"value": 10.0}),
            }
        );

        let create: MutateRequest = serde_json::from_value(json!({
            "flight": flight.to_string(),
            "target": "create",
            "op": "add",
            "component": "position",
            "data": {},
        }))
        .unwrap();
        assert_eq!(create.mutation.target, MutationTarget::Create);
    }

    #[test]
    fn test_query_request_defaults_to_everything() {
        let flight = FlightId::new();
        let req: QueryRequest =
            serde_json::from_value(json!({"flight": flight.to_string()})).unwrap();
        assert!(req.query.components.is_empty());
        assert_eq!(req.query.entity, None);
    }

    #[test]
    fn test_create_overrides_apply_on_defaults() {
        let req: CreateFlightRequest =
            serde_json::from_value(json!({"name": "kestrel", "tickRate": 30.0, "physics": "point-mass"}))
                .unwrap();
        let config = req.apply(&FlightConfig::new());
        assert_eq!(config.name, "kestrel");
        assert_eq!(config.tick.tick_rate, 30.0);
        assert_eq!(config.physics, BackendKind::PointMass);
        assert_eq!(config.tick.max_ticks, 0);
    }

    #[test]
    fn test_response_shapes() {
        let ok = ApiResponse::ok(&json!({"entity": 1}));
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"ok": {"entity": 1}}));

        let err = ApiResponse::from(Err::<(), _>(FlightError::UnknownFlight(FlightId::new())));
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["error"]["kind"], "unknownFlight");
        assert!(!err.is_ok());
    }

    #[test]
    fn test_change_event_flattens_record() {
        let flight = FlightId::new();
        let event = ChangeEvent {
            flight,
            tick: 4,
            record: ChangeRecord {
                entity: EntityId(2),
                component: None,
                kind: ChangeKind::EntityRemoved,
                value: None,
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["entity"], 2);
        assert_eq!(value["tick"], 4);
        assert!(value.get("component").is_none());
    }
}

//! Broadcast of flight changes to `{prefix}.events.{flight}.{component}`.

use helm_component::ComponentKind;
use helm_flight::FlightHandle;
use helm_net::subjects::ENTITY_SEGMENT;
use helm_net::{ChangeEvent, Codec, NatsConnection, Subjects};
use helm_notify::Filter;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Forward every change of `flight` until its hub closes on teardown.
/// Records for the entity itself go to the `entity` segment.
pub fn forward(
    connection: NatsConnection,
    subjects: Subjects,
    codec: Codec,
    flight: &FlightHandle,
) -> JoinHandle<()> {
    let mut changes = flight.subscribe_channel(Filter::all());
    let flight_id = flight.id();
    tokio::spawn(async move {
        let segment = flight_id.to_string();
        while let Some(set) = changes.recv().await {
            for record in &set {
                let component = record.component.map_or(ENTITY_SEGMENT, ComponentKind::name);
                let event = ChangeEvent {
                    flight: flight_id,
                    tick: set.tick,
                    record: record.clone(),
                };
                let subject = subjects.event(&segment, component);
                if let Err(e) = connection.publish(subject, codec, &event).await {
                    warn!(flight_id = %flight_id, error = %e, "could not publish change event");
                }
            }
        }
        debug!(flight_id = %flight_id, "event forwarding finished");
    })
}

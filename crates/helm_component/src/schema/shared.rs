//! Schema pieces composed into several components.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::EntityId;
use crate::error::FieldError;
use crate::validate::{Validate, ensure, finite};

/// Editor flags carried by timeline steps and triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeFlags {
    /// A disabled node is skipped.
    pub disabled: bool,
    /// Hidden from the crew-facing views.
    pub hidden: bool,
}

/// How damage is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DamageType {
    Kinetic,
    #[default]
    Explosive,
    Energy,
    Emp,
}

/// A condition checked by triggers and timeline steps. Component names are
/// registry names; fields are top-level keys of the component's JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TriggerCondition {
    EntityExists {
        entity: EntityId,
    },
    EntityMissing {
        entity: EntityId,
    },
    HasComponent {
        entity: EntityId,
        component: String,
    },
    FieldEquals {
        entity: EntityId,
        component: String,
        field: String,
        value: Value,
    },
    FieldAtLeast {
        entity: EntityId,
        component: String,
        field: String,
        value: f64,
    },
    FieldAtMost {
        entity: EntityId,
        component: String,
        field: String,
        value: f64,
    },
    StepCompleted {
        step: EntityId,
    },
}

impl Validate for TriggerCondition {
    fn validate(&self) -> Result<(), FieldError> {
        match self {
            TriggerCondition::HasComponent { component, .. } => {
                ensure(!component.is_empty(), "component", "must not be empty")
            }
            TriggerCondition::FieldEquals {
                component, field, ..
            } => {
                ensure(!component.is_empty(), "component", "must not be empty")?;
                ensure(!field.is_empty(), "field", "must not be empty")
            }
            TriggerCondition::FieldAtLeast {
                component,
                field,
                value,
                ..
            }
            | TriggerCondition::FieldAtMost {
                component,
                field,
                value,
                ..
            } => {
                ensure(!component.is_empty(), "component", "must not be empty")?;
                ensure(!field.is_empty(), "field", "must not be empty")?;
                finite("value", *value)
            }
            TriggerCondition::EntityExists { .. }
            | TriggerCondition::EntityMissing { .. }
            | TriggerCondition::StepCompleted { .. } => Ok(()),
        }
    }
}

impl TriggerCondition {
    /// Registry name of the component this condition reads.
    pub fn component(&self) -> Option<&str> {
        match self {
            TriggerCondition::HasComponent { component, .. }
            | TriggerCondition::FieldEquals { component, .. }
            | TriggerCondition::FieldAtLeast { component, .. }
            | TriggerCondition::FieldAtMost { component, .. } => Some(component),
            TriggerCondition::EntityExists { .. }
            | TriggerCondition::EntityMissing { .. }
            | TriggerCondition::StepCompleted { .. } => None,
        }
    }
}

/// A mutation performed when a trigger fires or a timeline step runs. Every
/// action goes through the store's validated mutation path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TimelineAction {
    SpawnEntity {
        components: BTreeMap<String, Value>,
    },
    AddComponent {
        entity: EntityId,
        component: String,
        data: Value,
    },
    UpdateComponent {
        entity: EntityId,
        component: String,
        partial: Value,
    },
    RemoveComponent {
        entity: EntityId,
        component: String,
    },
    RemoveEntity {
        entity: EntityId,
    },
    ActivateTimeline {
        timeline: EntityId,
    },
}

impl Validate for TimelineAction {
    fn validate(&self) -> Result<(), FieldError> {
        match self {
            TimelineAction::SpawnEntity { components } => ensure(
                components.keys().all(|k| !k.is_empty()),
                "components",
                "component names must not be empty",
            ),
            TimelineAction::AddComponent { component, .. }
            | TimelineAction::UpdateComponent { component, .. }
            | TimelineAction::RemoveComponent { component, .. } => {
                ensure(!component.is_empty(), "component", "must not be empty")
            }
            TimelineAction::RemoveEntity { .. } | TimelineAction::ActivateTimeline { .. } => {
                Ok(())
            }
        }
    }
}

impl TimelineAction {
    /// Registry names of the components this action writes.
    pub fn components(&self) -> Vec<&str> {
        match self {
            TimelineAction::SpawnEntity { components } => {
                components.keys().map(String::as_str).collect()
            }
            TimelineAction::AddComponent { component, .. }
            | TimelineAction::UpdateComponent { component, .. }
            | TimelineAction::RemoveComponent { component, .. } => vec![component.as_str()],
            TimelineAction::RemoveEntity { .. } | TimelineAction::ActivateTimeline { .. } => {
                Vec::new()
            }
        }
    }
}

//! Timelines, timeline steps and triggers.
//!
//! Automation is built from ordinary entities referencing each other by id:
//! a timeline lists its step entities in order, a step points back at its
//! timeline. Condition-checking systems walk this graph every tick.

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::error::FieldError;
use crate::schema::shared::{NodeFlags, TimelineAction, TriggerCondition};
use crate::validate::{Validate, ensure};

/// An ordered list of steps run one per tick while active.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct IsTimeline {
    pub name: String,
    pub is_mission: bool,
    pub active: bool,
    pub current_step_id: Option<EntityId>,
    /// Step entities in execution order.
    pub steps: Vec<EntityId>,
}

impl IsTimeline {
    /// The step after `current`, skipping nothing. `None` at the end.
    #[must_use]
    pub fn step_after(&self, current: EntityId) -> Option<EntityId> {
        let idx = self.steps.iter().position(|s| *s == current)?;
        self.steps.get(idx + 1).copied()
    }
}

impl Validate for IsTimeline {
    fn validate(&self) -> Result<(), FieldError> {
        ensure(
            self.current_step_id
                .is_none_or(|id| self.steps.contains(&id)),
            "currentStepId",
            "must be one of the timeline's steps",
        )
    }
}

/// One step of a timeline: conditions to wait on, then actions to run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct IsTimelineStep {
    pub timeline_id: Option<EntityId>,
    pub name: String,
    pub flags: NodeFlags,
    /// All must hold before the actions run. Empty means run immediately.
    pub conditions: Vec<TriggerCondition>,
    pub actions: Vec<TimelineAction>,
    pub completed: bool,
}

impl Validate for IsTimelineStep {
    fn validate(&self) -> Result<(), FieldError> {
        validate_node(&self.conditions, &self.actions)
    }
}

/// Conditions watched every tick and the actions run when all hold.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct IsTrigger {
    pub name: String,
    pub flags: NodeFlags,
    pub conditions: Vec<TriggerCondition>,
    pub actions: Vec<TimelineAction>,
    pub fired: bool,
    /// Fire again every tick the conditions hold.
    pub repeat: bool,
}

impl Validate for IsTrigger {
    fn validate(&self) -> Result<(), FieldError> {
        validate_node(&self.conditions, &self.actions)
    }
}

fn validate_node(
    conditions: &[TriggerCondition],
    actions: &[TimelineAction],
) -> Result<(), FieldError> {
    for (i, c) in conditions.iter().enumerate() {
        c.validate()
            .map_err(|e| FieldError::new(format!("conditions[{i}].{}", e.field), e.message))?;
    }
    for (i, a) in actions.iter().enumerate() {
        a.validate()
            .map_err(|e| FieldError::new(format!("actions[{i}].{}", e.field), e.message))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_after() {
        let t = IsTimeline {
            steps: vec![EntityId(5), EntityId(6), EntityId(7)],
            ..IsTimeline::default()
        };
        assert_eq!(t.step_after(EntityId(5)), Some(EntityId(6)));
        assert_eq!(t.step_after(EntityId(7)), None);
        assert_eq!(t.step_after(EntityId(1)), None);
    }

    #[test]
    fn test_current_step_must_belong_to_timeline() {
        let t = IsTimeline {
            steps: vec![EntityId(5)],
            current_step_id: Some(EntityId(9)),
            ..IsTimeline::default()
        };
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_nested_error_path() {
        let step = IsTimelineStep {
            actions: vec![TimelineAction::RemoveComponent {
                entity: EntityId(1),
                component: String::new(),
            }],
            ..IsTimelineStep::default()
        };
        let err = step.validate().unwrap_err();
        assert_eq!(err.field, "actions[0].component");
    }
}

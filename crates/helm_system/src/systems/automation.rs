//! Condition evaluation and action execution shared by triggers and
//! timeline steps.
//!
//! Conditions are read-only checks against the store. Actions mutate it
//! through the same validated paths external mutations use; entity and
//! component removals release physics handles first.

use helm_component::EntityId;
use helm_component::schema::{IsTimeline, IsTimelineStep, TimelineAction, TriggerCondition};
use helm_ecs::{Mutation, MutationTarget, World};
use serde_json::Value;
use tracing::debug;

use crate::context::SystemContext;
use crate::error::SystemError;
use crate::systems::despawn;

/// Whether `condition` holds right now. Conditions on missing entities or
/// components are false; unknown component names are errors.
pub fn condition_holds(world: &World, condition: &TriggerCondition) -> Result<bool, SystemError> {
    let holds = match condition {
        TriggerCondition::EntityExists { entity } => world.contains(*entity),
        TriggerCondition::EntityMissing { entity } => !world.contains(*entity),
        TriggerCondition::HasComponent { entity, component } => {
            let kind = world.registry().kind_of(component)?;
            world.has_kind(*entity, kind)
        }
        TriggerCondition::FieldEquals {
            entity,
            component,
            field,
            value,
        } => field_value(world, *entity, component, field)?
            .is_some_and(|actual| values_equal(&actual, value)),
        TriggerCondition::FieldAtLeast {
            entity,
            component,
            field,
            value,
        } => field_value(world, *entity, component, field)?
            .and_then(|v| v.as_f64())
            .is_some_and(|actual| actual >= *value),
        TriggerCondition::FieldAtMost {
            entity,
            component,
            field,
            value,
        } => field_value(world, *entity, component, field)?
            .and_then(|v| v.as_f64())
            .is_some_and(|actual| actual <= *value),
        TriggerCondition::StepCompleted { step } => world
            .get::<IsTimelineStep>(*step)
            .is_some_and(|s| s.completed),
    };
    Ok(holds)
}

/// Whether every condition holds. An empty list always holds.
pub fn all_hold(world: &World, conditions: &[TriggerCondition]) -> Result<bool, SystemError> {
    for condition in conditions {
        if !condition_holds(world, condition)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Perform one action against the store.
pub fn run_action(ctx: &mut SystemContext<'_>, action: &TimelineAction) -> Result<(), SystemError> {
    match action {
        TimelineAction::SpawnEntity { components } => {
            for (name, data) in components {
                let add = Mutation::create(name.clone(), data.clone());
                ctx.world.check_external_write(MutationTarget::Create, &add.op)?;
            }
            let id = ctx.world.spawn_json(components.clone())?;
            debug!(tick_id = ctx.tick, entity = %id, "action spawned entity");
        }
        TimelineAction::AddComponent {
            entity,
            component,
            data,
        } => {
            ctx.world
                .apply(Mutation::add(*entity, component.clone(), data.clone()))?;
        }
        TimelineAction::UpdateComponent {
            entity,
            component,
            partial,
        } => {
            ctx.world
                .apply(Mutation::update(*entity, component.clone(), partial.clone()))?;
        }
        TimelineAction::RemoveComponent { entity, component } => {
            let kind = ctx.world.registry().kind_of(component)?;
            ctx.physics.release_component(ctx.world, *entity, kind)?;
            ctx.world.remove_component(*entity, kind)?;
        }
        TimelineAction::RemoveEntity { entity } => {
            despawn(ctx, *entity)?;
        }
        TimelineAction::ActivateTimeline { timeline } => {
            ctx.world.update::<IsTimeline>(*timeline, |t| t.active = true)?;
        }
    }
    Ok(())
}

/// A top-level field of a component, or a nested one addressed with dots
/// (`"gravity.x"`). `None` when the entity, component or field is absent.
fn field_value(
    world: &World,
    entity: EntityId,
    component: &str,
    field: &str,
) -> Result<Option<Value>, SystemError> {
    let kind = world.registry().kind_of(component)?;
    let Some(data) = world.get_data(entity, kind) else {
        return Ok(None);
    };
    let json = data
        .to_json()
        .map_err(|e| SystemError::Invariant(format!("{component} did not serialise: {e}")))?;
    let pointer = format!("/{}", field.replace('.', "/"));
    Ok(json.pointer(&pointer).cloned())
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => actual == expected,
    }
}

#[cfg(test)]
mod tests {
    use helm_component::Component;
    use helm_component::schema::{Hull, Identity, PhysicsHandles, PhysicsWorld};
    use serde_json::json;

    use super::*;
    use crate::systems::testing::Harness;

    fn hull_at(h: &mut Harness, value: f64) -> EntityId {
        h.world
            .spawn([Hull { value, max: 100.0 }.into_data()])
            .unwrap()
    }

    fn field(entity: EntityId, name: &str, value: Value) -> TriggerCondition {
        TriggerCondition::FieldEquals {
            entity,
            component: "hull".into(),
            field: name.into(),
            value,
        }
    }

    #[test]
    fn test_field_comparisons() {
        let mut h = Harness::new(vec![]);
        let e = hull_at(&mut h, 40.0);
        let w = &h.world;

        assert!(condition_holds(w, &field(e, "value", json!(40))).unwrap());
        assert!(!condition_holds(w, &field(e, "value", json!("40"))).unwrap());
        assert!(!condition_holds(w, &field(e, "missing", json!(40))).unwrap());
        assert!(
            condition_holds(
                w,
                &TriggerCondition::FieldAtMost {
                    entity: e,
                    component: "hull".into(),
                    field: "value".into(),
                    value: 50.0,
                }
            )
            .unwrap()
        );
        assert!(
            !condition_holds(
                w,
                &TriggerCondition::FieldAtLeast {
                    entity: e,
                    component: "hull".into(),
                    field: "value".into(),
                    value: 50.0,
                }
            )
            .unwrap()
        );
    }

    #[test]
    fn test_missing_entity_is_false_unknown_component_is_error() {
        let h = Harness::new(vec![]);
        let ghost = EntityId(99);
        assert!(!condition_holds(&h.world, &field(ghost, "value", json!(1))).unwrap());
        assert!(condition_holds(&h.world, &TriggerCondition::EntityMissing { entity: ghost }).unwrap());
        let err = condition_holds(
            &h.world,
            &TriggerCondition::HasComponent {
                entity: ghost,
                component: "warpCore".into(),
            },
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_empty_conditions_hold() {
        let h = Harness::new(vec![]);
        assert!(all_hold(&h.world, &[]).unwrap());
    }

    #[test]
    fn test_actions_go_through_validation() {
        let mut h = Harness::new(vec![]);
        let e = hull_at(&mut h, 40.0);
        let mut ctx = SystemContext {
            world: &mut h.world,
            physics: &mut h.physics,
            tick: 1,
            elapsed: std::time::Duration::ZERO,
        };

        run_action(
            &mut ctx,
            &TimelineAction::UpdateComponent {
                entity: e,
                component: "hull".into(),
                partial: json!({"value": 75.0}),
            },
        )
        .unwrap();
        assert_eq!(ctx.world.get::<Hull>(e).unwrap().value, 75.0);

        let bad = run_action(
            &mut ctx,
            &TimelineAction::UpdateComponent {
                entity: e,
                component: "hull".into(),
                partial: json!({"value": "lots"}),
            },
        );
        assert!(bad.is_err());
        assert_eq!(ctx.world.get::<Hull>(e).unwrap().value, 75.0);

        let before = ctx.world.entity_count();
        run_action(
            &mut ctx,
            &TimelineAction::SpawnEntity {
                components: [("identity".to_string(), json!({"name": "Relay"}))].into(),
            },
        )
        .unwrap();
        assert_eq!(ctx.world.entity_count(), before + 1);
        assert!(
            ctx.world
                .query_with(|e| e.get::<Identity>().is_some_and(|i| i.name == "Relay"))
                .next()
                .is_some()
        );
    }

    #[test]
    fn test_removing_handles_detaches_first() {
        let mut h = Harness::new(vec![]);
        let world = h.world.spawn([PhysicsWorld::default().into_data()]).unwrap();
        let body = hull_at(&mut h, 10.0);
        h.physics.attach_body(&mut h.world, world, body, None).unwrap();
        let mut ctx = SystemContext {
            world: &mut h.world,
            physics: &mut h.physics,
            tick: 1,
            elapsed: std::time::Duration::ZERO,
        };

        run_action(
            &mut ctx,
            &TimelineAction::RemoveComponent {
                entity: body,
                component: "physicsHandles".into(),
            },
        )
        .unwrap();
        assert!(!h.world.has::<PhysicsHandles>(body));
        assert_eq!(h.physics.body_count(world), 0);
        assert!(h.world.get::<PhysicsWorld>(world).unwrap().bodies.is_empty());
    }

    #[test]
    fn test_actions_cannot_rewrite_handle_tables() {
        let mut h = Harness::new(vec![]);
        let world = h.world.spawn([PhysicsWorld::default().into_data()]).unwrap();
        let body = hull_at(&mut h, 10.0);
        h.physics.attach_body(&mut h.world, world, body, None).unwrap();
        let mut ctx = SystemContext {
            world: &mut h.world,
            physics: &mut h.physics,
            tick: 1,
            elapsed: std::time::Duration::ZERO,
        };

        let cleared = run_action(
            &mut ctx,
            &TimelineAction::UpdateComponent {
                entity: body,
                component: "physicsHandles".into(),
                partial: json!({"handles": {}}),
            },
        );
        assert!(cleared.is_err());
        let forged = run_action(
            &mut ctx,
            &TimelineAction::SpawnEntity {
                components: [("physicsWorld".to_string(), json!({"bodies": {"1": 4}}))].into(),
            },
        );
        assert!(forged.is_err());

        assert!(h.world.get::<PhysicsHandles>(body).unwrap().is_attached());
        assert_eq!(h.physics.body_count(world), 1);
    }
}

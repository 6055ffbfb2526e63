use helm_component::schema::IsTrigger;
use helm_component::{ComponentKind, EntityId};
use helm_ecs::{EntityRef, Query};
use tracing::{info, warn};

use crate::context::SystemContext;
use crate::error::SystemError;
use crate::system::System;
use crate::systems::automation::{all_hold, run_action};

/// Fires enabled triggers whose conditions all hold. A one-shot trigger
/// fires once; a repeating one fires on every tick its conditions hold.
pub struct TriggerSystem;

impl System for TriggerSystem {
    fn name(&self) -> &'static str {
        "trigger"
    }

    fn query(&self) -> Query {
        Query::all_of(&[ComponentKind::IsTrigger])
    }

    fn matches(&self, entity: EntityRef<'_>) -> bool {
        entity
            .get::<IsTrigger>()
            .is_some_and(|t| !t.flags.disabled && (t.repeat || !t.fired))
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, entity: EntityId) -> Result<(), SystemError> {
        let Some(trigger) = ctx.world.get::<IsTrigger>(entity).cloned() else {
            return Ok(());
        };
        if !all_hold(ctx.world, &trigger.conditions)? {
            return Ok(());
        }
        let outcome = trigger
            .actions
            .iter()
            .try_for_each(|action| run_action(ctx, action));
        let faulted = outcome.is_err();
        // an action may have removed the trigger itself
        if ctx.world.has::<IsTrigger>(entity) {
            ctx.world.update::<IsTrigger>(entity, |t| {
                t.fired = true;
                if faulted {
                    t.flags.disabled = true;
                }
            })?;
        }
        if let Err(e) = outcome {
            warn!(
                tick_id = ctx.tick,
                trigger = %entity,
                name = %trigger.name,
                error = %e,
                "trigger action failed; trigger disabled"
            );
            return Err(e);
        }
        info!(
            tick_id = ctx.tick,
            trigger = %entity,
            name = %trigger.name,
            actions = trigger.actions.len(),
            "trigger fired"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use helm_component::Component;
    use helm_component::schema::{
        Hull, Identity, IsDestroyed, NodeFlags, TimelineAction, TriggerCondition,
    };
    use serde_json::json;

    use super::*;
    use crate::systems::testing::Harness;

    fn low_hull_trigger(target: EntityId, repeat: bool) -> IsTrigger {
        IsTrigger {
            name: "abandon ship".into(),
            conditions: vec![TriggerCondition::FieldAtMost {
                entity: target,
                component: "hull".into(),
                field: "value".into(),
                value: 20.0,
            }],
            actions: vec![TimelineAction::UpdateComponent {
                entity: target,
                component: "hull".into(),
                partial: json!({"max": 50.0}),
            }],
            repeat,
            ..IsTrigger::default()
        }
    }

    #[test]
    fn test_fires_once_when_conditions_hold() {
        let mut h = Harness::new(vec![Box::new(TriggerSystem)]);
        let ship = h
            .world
            .spawn([Hull { value: 80.0, max: 100.0 }.into_data()])
            .unwrap();
        let trigger = h
            .world
            .spawn([low_hull_trigger(ship, false).into_data()])
            .unwrap();

        h.tick_ms(16);
        assert!(!h.world.get::<IsTrigger>(trigger).unwrap().fired);

        h.world.update::<Hull>(ship, |hull| hull.value = 10.0).unwrap();
        let report = h.tick_ms(16);
        assert_eq!(report.updates, 1);
        assert!(h.world.get::<IsTrigger>(trigger).unwrap().fired);
        assert_eq!(h.world.get::<Hull>(ship).unwrap().max, 50.0);

        // fired one-shot triggers are no longer visited
        let report = h.tick_ms(16);
        assert_eq!(report.updates, 0);
    }

    #[test]
    fn test_disabled_trigger_never_fires() {
        let mut h = Harness::new(vec![Box::new(TriggerSystem)]);
        let ship = h
            .world
            .spawn([Hull { value: 10.0, max: 100.0 }.into_data()])
            .unwrap();
        let trigger = h
            .world
            .spawn([IsTrigger {
                flags: NodeFlags {
                    disabled: true,
                    ..NodeFlags::default()
                },
                ..low_hull_trigger(ship, true)
            }
            .into_data()])
            .unwrap();

        h.tick_ms(16);
        assert!(!h.world.get::<IsTrigger>(trigger).unwrap().fired);
        assert_eq!(h.world.get::<Hull>(ship).unwrap().max, 100.0);
    }

    #[test]
    fn test_trigger_removing_itself() {
        let mut h = Harness::new(vec![Box::new(TriggerSystem)]);
        let ship = h.world.spawn([Hull::default().into_data()]).unwrap();
        let trigger = h.world.create_entity();
        h.world
            .add(
                trigger,
                IsTrigger {
                    actions: vec![
                        TimelineAction::AddComponent {
                            entity: ship,
                            component: "isDestroyed".into(),
                            data: json!({"timeToDestroy": 500.0}),
                        },
                        TimelineAction::RemoveEntity { entity: trigger },
                    ],
                    ..IsTrigger::default()
                },
            )
            .unwrap();

        let report = h.tick_ms(16);
        assert_eq!(report.removed, vec![trigger]);
        assert_eq!(
            h.world.get::<IsDestroyed>(ship).unwrap().time_to_destroy,
            500.0
        );
    }

    #[test]
    fn test_failing_action_disables_trigger() {
        let mut h = Harness::new(vec![Box::new(TriggerSystem)]);
        let trigger = h
            .world
            .spawn([IsTrigger {
                name: "hail".into(),
                actions: vec![
                    TimelineAction::SpawnEntity {
                        components: [("identity".to_string(), json!({"name": "Buoy"}))].into(),
                    },
                    TimelineAction::UpdateComponent {
                        entity: EntityId(404),
                        component: "hull".into(),
                        partial: json!({"value": 1.0}),
                    },
                ],
                repeat: true,
                ..IsTrigger::default()
            }
            .into_data()])
            .unwrap();

        let report = h.step_ms(16);
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].entity, trigger);
        for _ in 0..4 {
            let report = h.tick_ms(16);
            assert_eq!(report.updates, 0);
        }

        let stored = h.world.get::<IsTrigger>(trigger).unwrap();
        assert!(stored.fired);
        assert!(stored.flags.disabled);
        let buoys = h
            .world
            .query_with(|e| e.get::<Identity>().is_some_and(|i| i.name == "Buoy"))
            .count();
        assert_eq!(buoys, 1);
    }
}

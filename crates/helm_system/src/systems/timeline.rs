use helm_component::schema::{IsTimeline, IsTimelineStep};
use helm_component::{ComponentKind, EntityId};
use helm_ecs::{EntityRef, Query, World};
use tracing::{debug, info, warn};

use crate::context::SystemContext;
use crate::error::SystemError;
use crate::system::System;
use crate::systems::automation::{all_hold, run_action};

/// Advances active timelines by at most one step per tick. The current
/// step runs once its conditions hold; the timeline then moves to the next
/// runnable step, and deactivates after the last one.
pub struct TimelineSystem;

impl System for TimelineSystem {
    fn name(&self) -> &'static str {
        "timeline"
    }

    fn query(&self) -> Query {
        Query::all_of(&[ComponentKind::IsTimeline])
    }

    fn matches(&self, entity: EntityRef<'_>) -> bool {
        entity.get::<IsTimeline>().is_some_and(|t| t.active)
    }

    fn uses(&self) -> &'static [ComponentKind] {
        &[ComponentKind::IsTimelineStep]
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, timeline: EntityId) -> Result<(), SystemError> {
        let Some(state) = ctx.world.get::<IsTimeline>(timeline).cloned() else {
            return Ok(());
        };
        let current = match state.current_step_id {
            Some(step) => Some(step),
            None => next_runnable(ctx.world, &state, None),
        };
        let Some(current) = current else {
            return finish(ctx, timeline);
        };

        let step = ctx.world.get::<IsTimelineStep>(current).cloned();
        let runnable = step.as_ref().is_some_and(|s| !s.flags.disabled && !s.completed);
        if let Some(step) = step.filter(|_| runnable) {
            if !all_hold(ctx.world, &step.conditions)? {
                if state.current_step_id != Some(current) {
                    ctx.world
                        .update::<IsTimeline>(timeline, |t| t.current_step_id = Some(current))?;
                }
                return Ok(());
            }
            let outcome = step
                .actions
                .iter()
                .try_for_each(|action| run_action(ctx, action));
            if let Err(e) = outcome {
                // a half-run step never reruns; the next tick skips past it
                if ctx.world.has::<IsTimelineStep>(current) {
                    ctx.world
                        .update::<IsTimelineStep>(current, |s| s.flags.disabled = true)?;
                }
                warn!(tick_id = ctx.tick, timeline = %timeline, step = %current, error = %e, "timeline step failed; step disabled");
                return Err(e);
            }
            if ctx.world.has::<IsTimelineStep>(current) {
                ctx.world
                    .update::<IsTimelineStep>(current, |s| s.completed = true)?;
            }
            info!(tick_id = ctx.tick, timeline = %timeline, step = %current, name = %step.name, "timeline step completed");
        } else {
            debug!(tick_id = ctx.tick, timeline = %timeline, step = %current, "timeline step skipped");
        }

        // actions may have removed or rewritten the timeline
        let Some(state) = ctx.world.get::<IsTimeline>(timeline).cloned() else {
            return Ok(());
        };
        match next_runnable(ctx.world, &state, Some(current)) {
            Some(next) => {
                ctx.world
                    .update::<IsTimeline>(timeline, |t| t.current_step_id = Some(next))?;
                Ok(())
            }
            None => finish(ctx, timeline),
        }
    }
}

/// The first step after `after` (or from the start) that exists, is
/// enabled and has not completed.
fn next_runnable(world: &World, timeline: &IsTimeline, after: Option<EntityId>) -> Option<EntityId> {
    let start = match after {
        Some(step) => timeline.steps.iter().position(|s| *s == step)? + 1,
        None => 0,
    };
    timeline.steps[start..].iter().copied().find(|id| {
        world
            .get::<IsTimelineStep>(*id)
            .is_some_and(|s| !s.flags.disabled && !s.completed)
    })
}

fn finish(ctx: &mut SystemContext<'_>, timeline: EntityId) -> Result<(), SystemError> {
    ctx.world.update::<IsTimeline>(timeline, |t| {
        t.current_step_id = None;
        t.active = false;
    })?;
    info!(tick_id = ctx.tick, timeline = %timeline, "timeline finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use helm_component::Component;
    use helm_component::schema::{Hull, NodeFlags, TimelineAction, TriggerCondition};
    use serde_json::json;

    use super::*;
    use crate::systems::testing::Harness;

    fn step(h: &mut Harness, conditions: Vec<TriggerCondition>, actions: Vec<TimelineAction>) -> EntityId {
        h.world
            .spawn([IsTimelineStep {
                conditions,
                actions,
                ..IsTimelineStep::default()
            }
            .into_data()])
            .unwrap()
    }

    fn set_hull(target: EntityId, value: f64) -> TimelineAction {
        TimelineAction::UpdateComponent {
            entity: target,
            component: "hull".into(),
            partial: json!({ "value": value }),
        }
    }

    fn timeline(h: &mut Harness, steps: Vec<EntityId>) -> EntityId {
        h.world
            .spawn([IsTimeline {
                name: "patrol".into(),
                active: true,
                steps,
                ..IsTimeline::default()
            }
            .into_data()])
            .unwrap()
    }

    #[test]
    fn test_one_step_per_tick_then_deactivate() {
        let mut h = Harness::new(vec![Box::new(TimelineSystem)]);
        let target = h.world.spawn([Hull::default().into_data()]).unwrap();
        let s1 = step(&mut h, vec![], vec![set_hull(target, 90.0)]);
        let s2 = step(&mut h, vec![], vec![set_hull(target, 80.0)]);
        let tl = timeline(&mut h, vec![s1, s2]);

        h.tick_ms(16);
        assert_eq!(h.world.get::<Hull>(target).unwrap().value, 90.0);
        assert!(h.world.get::<IsTimelineStep>(s1).unwrap().completed);
        assert_eq!(h.world.get::<IsTimeline>(tl).unwrap().current_step_id, Some(s2));

        h.tick_ms(16);
        assert_eq!(h.world.get::<Hull>(target).unwrap().value, 80.0);
        let state = h.world.get::<IsTimeline>(tl).unwrap();
        assert!(!state.active);
        assert_eq!(state.current_step_id, None);

        let report = h.tick_ms(16);
        assert_eq!(report.updates, 0);
    }

    #[test]
    fn test_step_waits_for_conditions() {
        let mut h = Harness::new(vec![Box::new(TimelineSystem)]);
        let target = h.world.spawn([Hull::default().into_data()]).unwrap();
        let s1 = step(&mut h, vec![], vec![set_hull(target, 50.0)]);
        let s2 = step(
            &mut h,
            vec![TriggerCondition::StepCompleted { step: s1 }],
            vec![set_hull(target, 25.0)],
        );
        let gate = h.world.create_entity();
        let s3 = step(
            &mut h,
            vec![TriggerCondition::EntityMissing { entity: gate }],
            vec![set_hull(target, 5.0)],
        );
        let tl = timeline(&mut h, vec![s1, s2, s3]);

        h.tick_ms(16);
        h.tick_ms(16);
        assert_eq!(h.world.get::<Hull>(target).unwrap().value, 25.0);
        h.tick_ms(16);
        assert_eq!(h.world.get::<Hull>(target).unwrap().value, 25.0);
        assert_eq!(h.world.get::<IsTimeline>(tl).unwrap().current_step_id, Some(s3));

        h.world.remove_entity(gate).unwrap();
        h.tick_ms(16);
        assert_eq!(h.world.get::<Hull>(target).unwrap().value, 5.0);
        assert!(!h.world.get::<IsTimeline>(tl).unwrap().active);
    }

    #[test]
    fn test_disabled_steps_are_skipped() {
        let mut h = Harness::new(vec![Box::new(TimelineSystem)]);
        let target = h.world.spawn([Hull::default().into_data()]).unwrap();
        let skipped = h
            .world
            .spawn([IsTimelineStep {
                flags: NodeFlags {
                    disabled: true,
                    ..NodeFlags::default()
                },
                actions: vec![set_hull(target, 1.0)],
                ..IsTimelineStep::default()
            }
            .into_data()])
            .unwrap();
        let run = step(&mut h, vec![], vec![set_hull(target, 60.0)]);
        let tl = timeline(&mut h, vec![skipped, run]);

        h.tick_ms(16);
        assert_eq!(h.world.get::<Hull>(target).unwrap().value, 60.0);
        assert!(!h.world.get::<IsTimelineStep>(skipped).unwrap().completed);
        assert!(!h.world.get::<IsTimeline>(tl).unwrap().active);
    }

    #[test]
    fn test_activate_timeline_action() {
        let mut h = Harness::new(vec![Box::new(TimelineSystem)]);
        let target = h.world.spawn([Hull::default().into_data()]).unwrap();
        let inner_step = step(&mut h, vec![], vec![set_hull(target, 10.0)]);
        let inner = h
            .world
            .spawn([IsTimeline {
                steps: vec![inner_step],
                ..IsTimeline::default()
            }
            .into_data()])
            .unwrap();
        let outer_step = step(
            &mut h,
            vec![],
            vec![TimelineAction::ActivateTimeline { timeline: inner }],
        );
        timeline(&mut h, vec![outer_step]);

        h.tick_ms(16);
        // inactive when the pass matched, so it starts next tick
        assert!(h.world.get::<IsTimeline>(inner).unwrap().active);
        assert_eq!(h.world.get::<Hull>(target).unwrap().value, 100.0);
        h.tick_ms(16);
        assert_eq!(h.world.get::<Hull>(target).unwrap().value, 10.0);
    }

    #[test]
    fn test_failed_step_is_not_rerun() {
        let mut h = Harness::new(vec![Box::new(TimelineSystem)]);
        let target = h.world.spawn([Hull::default().into_data()]).unwrap();
        let broken = step(
            &mut h,
            vec![],
            vec![set_hull(target, 70.0), set_hull(EntityId(404), 1.0)],
        );
        let next = step(&mut h, vec![], vec![set_hull(target, 60.0)]);
        let tl = timeline(&mut h, vec![broken, next]);

        let report = h.step_ms(16);
        assert_eq!(report.faults.len(), 1);
        let failed = h.world.get::<IsTimelineStep>(broken).unwrap();
        assert!(failed.flags.disabled);
        assert!(!failed.completed);

        h.world.update::<Hull>(target, |hull| hull.value = 100.0).unwrap();
        h.tick_ms(16);
        assert_eq!(h.world.get::<Hull>(target).unwrap().value, 60.0);
        assert!(!h.world.get::<IsTimeline>(tl).unwrap().active);
    }
}

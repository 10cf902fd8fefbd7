//! Bevy integration - ticks navigation agents in FixedUpdate

use bevy::prelude::*;

use crate::ai::NavigationAgent;
use crate::tuning::{NAV_TUNING_FILE, NavTuning};
use crate::world::{KinematicBody, LevelGeometry, integrate_body};

/// Adds the navigation tick. Uses the `LevelGeometry` and `NavTuning`
/// resources, inserting defaults when the app has none.
pub struct NavigationPlugin {
    /// Load tuning from `NAV_TUNING_FILE` when no `NavTuning` is present
    pub load_tuning_file: bool,
}

impl Default for NavigationPlugin {
    fn default() -> Self {
        Self {
            load_tuning_file: true,
        }
    }
}

impl Plugin for NavigationPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<NavTuning>() {
            let tuning = if self.load_tuning_file {
                NavTuning::load_or_default(NAV_TUNING_FILE)
            } else {
                NavTuning::default()
            };
            app.insert_resource(tuning);
        }
        app.init_resource::<LevelGeometry>()
            .add_systems(FixedUpdate, navigation_tick);
    }
}

/// Navigation then body integration for every agent
pub fn navigation_tick(
    time: Res<Time>,
    geometry: Res<LevelGeometry>,
    tuning: Res<NavTuning>,
    mut agents: Query<(&mut NavigationAgent, &mut KinematicBody)>,
) {
    let dt = time.delta_secs();
    if dt <= 0.0 {
        return;
    }
    let solid = tuning.layers.solid();
    for (mut agent, mut body) in &mut agents {
        agent.update(dt, &*geometry, &mut body);
        integrate_body(&mut body, &geometry, solid, tuning.physics.gravity, dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AlwaysAggro, NavState, WaypointGraph};
    use crate::constants::FIXED_DT;
    use crate::world::LayerMask;
    use std::sync::Arc;
    use std::time::Duration;

    fn app() -> App {
        let mut geometry = LevelGeometry::new();
        geometry.add_solid(Vec2::new(-20.0, -1.0), Vec2::new(20.0, 0.0), LayerMask::GROUND);

        let mut app = App::new();
        app.insert_resource(geometry);
        app.init_resource::<Time>();
        app.add_plugins(NavigationPlugin {
            load_tuning_file: false,
        });
        app
    }

    fn tick(app: &mut App) {
        app.world_mut()
            .resource_mut::<Time>()
            .advance_by(Duration::from_secs_f32(FIXED_DT));
        app.world_mut().run_schedule(FixedUpdate);
    }

    #[test]
    fn test_plugin_moves_agent_toward_target() {
        let mut app = app();
        let tuning = app.world().resource::<NavTuning>().clone();
        let agent = NavigationAgent::new(&tuning, Arc::new(WaypointGraph::default()))
            .with_target(Vec2::new(5.0, 0.0))
            .with_aggro(AlwaysAggro);
        let entity = app
            .world_mut()
            .spawn((agent, KinematicBody::at(Vec2::ZERO)))
            .id();

        for _ in 0..30 {
            tick(&mut app);
        }

        let world = app.world();
        let body = world.get::<KinematicBody>(entity).unwrap();
        let agent = world.get::<NavigationAgent>(entity).unwrap();
        assert_eq!(agent.current_state(), NavState::Walking);
        assert!(body.position.x > 1.0);
        assert_eq!(body.position.y, 0.0);
    }

    #[test]
    fn test_zero_delta_does_nothing() {
        let mut app = app();
        let tuning = app.world().resource::<NavTuning>().clone();
        let agent = NavigationAgent::new(&tuning, Arc::new(WaypointGraph::default()))
            .with_target(Vec2::new(5.0, 0.0))
            .with_aggro(AlwaysAggro);
        let entity = app
            .world_mut()
            .spawn((agent, KinematicBody::at(Vec2::ZERO)))
            .id();

        app.world_mut().run_schedule(FixedUpdate);
        let agent = app.world().get::<NavigationAgent>(entity).unwrap();
        assert_eq!(agent.current_state(), NavState::Idle);
    }
}

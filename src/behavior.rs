//! The seam between the agent runtime and play logic.
//!
//! The runtime invokes `think` once per fresh perception with read access
//! to the world model and write access to the action queue; everything a
//! player, goalie, or coach decides lives behind this trait.

use async_trait::async_trait;

use crate::actions::ActionQueue;
use crate::world::WorldModel;

/// Per-cycle decision callback driven by the agent core.
#[async_trait]
pub trait Behavior: Send {
    /// Invoked exactly once, before the first think cycle.
    async fn on_connect(&mut self, _world: &WorldModel, _actions: &mut ActionQueue) {}

    /// Invoked once per fresh perception cycle.
    async fn think(&mut self, world: &WorldModel, actions: &mut ActionQueue);
}

/// A minimal reference player: find the ball, chase it, kick it at the
/// enemy goal. Enough to exercise the runtime against a live server.
#[derive(Debug, Default)]
pub struct DemoBehavior;

#[async_trait]
impl Behavior for DemoBehavior {
    async fn think(&mut self, world: &WorldModel, actions: &mut ActionQueue) {
        let Some(ball) = world.ball.as_ref() else {
            actions.turn(30.0);
            return;
        };
        let Some(bearing) = ball.bearing else {
            actions.turn(30.0);
            return;
        };

        if world.is_ball_kickable() {
            // straight at the enemy goal, as hard as allowed
            actions.kick(world.params.maxpower, bearing);
        } else if (-7.0..=7.0).contains(&bearing) {
            actions.dash(65.0);
        } else {
            actions.turn(bearing / 2.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Command;
    use crate::objects::Ball;

    #[tokio::test]
    async fn test_demo_searches_without_ball() {
        let world = WorldModel::new("testers");
        let mut actions = ActionQueue::new();
        DemoBehavior.think(&world, &mut actions).await;
        assert_eq!(actions.flush(), vec![Command::Turn { angle: 30.0 }]);
    }

    #[tokio::test]
    async fn test_demo_chases_and_kicks() {
        let mut world = WorldModel::new("testers");
        world.ball = Some(Ball {
            distance: Some(10.0),
            bearing: Some(2.0),
            ..Default::default()
        });
        let mut actions = ActionQueue::new();
        DemoBehavior.think(&world, &mut actions).await;
        assert_eq!(actions.flush(), vec![Command::Dash { power: 65.0 }]);

        world.ball.as_mut().unwrap().distance = Some(0.5);
        DemoBehavior.think(&world, &mut actions).await;
        assert!(matches!(actions.flush()[0], Command::Kick { .. }));

        world.ball.as_mut().unwrap().distance = Some(10.0);
        world.ball.as_mut().unwrap().bearing = Some(-40.0);
        DemoBehavior.think(&world, &mut actions).await;
        assert_eq!(actions.flush(), vec![Command::Turn { angle: -20.0 }]);
    }
}

//! Physics collaborator
//!
//! The scene does not simulate physics itself. A [`PhysicsWorld`] is stepped
//! by [`SceneGraph::simulate`](crate::scene::SceneGraph::simulate) and hands
//! back the poses it moved; `synchronize` writes them into entity transforms
//! before world matrices are refreshed.

use crate::ecs::EntityId;
use crate::foundation::math::Transform;

/// New local transform of a simulated entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Entity moved by the simulation
    pub entity: EntityId,
    /// Its new local transform
    pub transform: Transform,
}

/// Physics simulation driven by the scene
pub trait PhysicsWorld: Send {
    /// Advance the simulation by `dt` seconds
    fn step(&mut self, dt: f32);

    /// Poses changed since the last call
    fn drain_poses(&mut self) -> Vec<Pose>;
}

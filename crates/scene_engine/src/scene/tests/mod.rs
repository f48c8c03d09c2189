//! Scene scenarios driven through the headless device

mod events;
mod resources;

use std::sync::Arc;

use parking_lot::Mutex;

use super::{Camera, MeshDrawable, SceneGraph};
use crate::core::{EngineConfig, RenderConfig};
use crate::ecs::{Component, ComponentCx, EntityId, Named, TypeKey};
use crate::events::Event;
use crate::foundation::math::{Transform, Vec3};
use crate::render::{
    CullingMode, Geometry, GeometryRenderer, HeadlessDevice, RenderDevice, RenderSystem,
    ShaderSource,
};
use crate::spatial::Aabb;
use crate::EngineContext;

struct Fixture {
    headless: Arc<HeadlessDevice>,
    // Keeps the worker pool and factory alive for the scene
    _context: EngineContext,
    scene: SceneGraph,
}

fn fixture_with(config: EngineConfig) -> Fixture {
    let headless = Arc::new(HeadlessDevice::new());
    let device: Arc<dyn RenderDevice> = headless.clone();
    let context = EngineContext::new(config).with_device(device);
    let scene = SceneGraph::new(&context);
    Fixture {
        headless,
        _context: context,
        scene,
    }
}

fn fixture() -> Fixture {
    fixture_with(EngineConfig::new().with_worker_threads(0))
}

fn fixture_rendering(render: RenderConfig) -> Fixture {
    fixture_with(EngineConfig::new().with_worker_threads(0).with_render(render))
}

fn triangle() -> Geometry {
    Geometry {
        vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        indices: Vec::new(),
        stride: 3,
    }
}

fn mesh(scene: &SceneGraph, primitive: &str) -> MeshDrawable {
    let caches = scene.caches().expect("scene has a device");
    let lease = caches
        .primitives
        .lease(primitive, &triangle())
        .expect("primitive builds");
    MeshDrawable::new(lease, None, Aabb::unit())
}

fn entity_at(scene: &SceneGraph, name: &str, position: Vec3) -> EntityId {
    let id = scene.create_entity(name);
    scene.set_transform(id, Transform::from_position(position));
    id
}

/// Camera at the origin looking down -Z, drawing `MeshDrawable`s
fn add_camera(scene: &SceneGraph, culling: CullingMode) -> (EntityId, Arc<Mutex<RenderSystem>>) {
    let mut system = scene.create_render_system();
    assert!(system.add_stage(Box::new(GeometryRenderer::<MeshDrawable>::new(
        "geometry",
        ShaderSource::new("geometry", "void main() {}"),
    ))));

    let id = scene.create_entity("camera");
    let camera = Camera::new(system).with_culling(culling);
    let pipeline = camera.render_system();
    assert!(scene.add(id, camera));
    assert!(scene.set_camera(id));
    (id, pipeline)
}

/// Records every callback it receives
struct Recorder {
    log: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (Self { log: Arc::clone(&log) }, log)
    }
}

impl Named for Recorder {
    const NAME: &'static str = "Recorder";
}

impl Component for Recorder {
    fn type_key(&self) -> TypeKey {
        Self::KEY
    }

    fn update(&mut self, _cx: &mut ComponentCx<'_>, time: f32) {
        self.log.lock().push(format!("update {time}"));
    }

    fn synchronize(&mut self, _cx: &mut ComponentCx<'_>) {
        self.log.lock().push("synchronize".to_string());
    }

    fn on_event(&mut self, _cx: &mut ComponentCx<'_>, event: &Event) {
        self.log.lock().push(format!("event {}", event.name()));
    }
}

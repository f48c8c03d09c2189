//! # Scene Graph
//!
//! The scene owns its entities, the per-type component indices, the material
//! table, the display targets and the event queue, and drives one tick as
//! four phases:
//!
//! 1. **simulate**: step the physics collaborator
//! 2. **synchronize**: apply physics poses, refresh world matrices down the
//!    hierarchy, move drawables in the spatial index, reassign dense entity
//!    indices
//! 3. **update**: update every active component (in parallel chunks on the
//!    worker pool), refresh distances to the active camera, then dispatch
//!    queued events
//! 4. **render**: upload dirty materials, clear the display and run the
//!    active camera's render system
//!
//! ## Locking
//!
//! Structural edits (entities, components, materials, display) take the
//! [`SceneBarrier`] exclusively; phases enter it as readers. Inside, locks
//! are always taken in the order barrier, scene state, entity. Component
//! callbacks and culling callbacks run with their entity locked and must
//! not call back into the scene.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use slotmap::SlotMap;

use super::barrier::{BarrierGuard, Phase, PhaseGuard, SceneBarrier};
use super::camera::Camera;
use super::display::DisplayTargets;
use super::material::{Material, MaterialId, MaterialTable};
use crate::context::EngineContext;
use crate::core::{RenderConfig, SceneConfig};
use crate::ecs::{
    Category, Component, ComponentFactory, ComponentRef, ComponentRegistry, Entity, EntityId,
    IndexFilter, Membership, Named, SpatialQuery, TypeKey,
};
use crate::events::{Event, EventListener, EventQueue, EventTarget};
use crate::foundation::math::{Mat4, Transform};
use crate::foundation::{await_all, WorkerPool};
use crate::physics::PhysicsWorld;
use crate::render::{RenderDevice, RenderSystem, StageSetup, TargetHandle, Viewer};
use crate::resources::ResourceCaches;
use crate::spatial::Sphere;

type SharedEntity = Arc<Mutex<Entity>>;

/// Handle of a registered event listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    name: String,
    handler: Box<dyn EventListener>,
}

struct SceneState {
    entities: SlotMap<EntityId, SharedEntity>,
    /// Creation order; position is the dense entity index
    order: Vec<EntityId>,
    registry: ComponentRegistry,
    /// Active components awaiting `update`
    pending: BTreeSet<ComponentRef>,
    materials: MaterialTable,
    display: Option<DisplayTargets>,
    camera: Option<EntityId>,
}

impl SceneState {
    fn entity(&self, id: EntityId) -> Option<SharedEntity> {
        self.entities.get(id).cloned()
    }

    fn reindex(&self) {
        for (index, id) in self.order.iter().enumerate() {
            if let Some(entity) = self.entities.get(*id) {
                entity.lock().core_mut().set_index(index);
            }
        }
    }
}

/// Keeps the registry and the pending set in step with activation
struct IndexSink<'a> {
    registry: &'a mut ComponentRegistry,
    pending: &'a mut BTreeSet<ComponentRef>,
}

impl Membership for IndexSink<'_> {
    fn joined(&mut self, entity: EntityId, key: TypeKey, drawable: Option<(Category, Sphere)>) {
        let component = ComponentRef::new(entity, key);
        self.registry.insert(component, drawable);
        self.pending.insert(component);
    }

    fn left(&mut self, entity: EntityId, key: TypeKey) {
        let component = ComponentRef::new(entity, key);
        self.registry.remove(component);
        self.pending.remove(&component);
    }
}

/// Entities, indices and per-tick orchestration of one scene
pub struct SceneGraph {
    barrier: SceneBarrier,
    state: RwLock<SceneState>,
    events: Arc<EventQueue>,
    listeners: Mutex<Vec<Listener>>,
    next_listener: AtomicU64,
    physics: Mutex<Option<Box<dyn PhysicsWorld>>>,
    device: Option<Arc<dyn RenderDevice>>,
    caches: Option<ResourceCaches>,
    factory: Arc<ComponentFactory>,
    workers: Arc<WorkerPool>,
    config: SceneConfig,
    render_config: RenderConfig,
}

impl SceneGraph {
    /// Create an empty scene using the context's device, factory and workers
    pub fn new(context: &EngineContext) -> Self {
        let config = context.config().scene.clone();
        let render_config = context.config().render.clone();
        let device = context.device().cloned();
        let caches = device.as_ref().map(ResourceCaches::new);
        if device.is_none() {
            log::debug!("Scene created without a render device");
        }

        Self {
            barrier: SceneBarrier::new(),
            state: RwLock::new(SceneState {
                entities: SlotMap::with_key(),
                order: Vec::new(),
                registry: ComponentRegistry::new(config.world_bounds(), config.octree.clone()),
                pending: BTreeSet::new(),
                materials: MaterialTable::new(),
                display: None,
                camera: None,
            }),
            events: Arc::new(EventQueue::new()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            physics: Mutex::new(None),
            device,
            caches,
            factory: Arc::clone(context.factory()),
            workers: Arc::clone(context.workers()),
            config,
            render_config,
        }
    }

    /// Install the physics collaborator; returns the previous one
    pub fn set_physics(&self, physics: Box<dyn PhysicsWorld>) -> Option<Box<dyn PhysicsWorld>> {
        let _guard = self.barrier.lock();
        self.physics.lock().replace(physics)
    }

    // ---- Entities ------------------------------------------------------

    /// Create an entity at the end of the dense order
    pub fn create_entity(&self, name: impl Into<String>) -> EntityId {
        let name = name.into();
        let _guard = self.barrier.lock();
        let mut state = self.state.write();
        let index = state.order.len();
        let id = state.entities.insert_with_key(|id| {
            let mut entity = Entity::new(id, name.as_str());
            entity.core_mut().set_index(index);
            Arc::new(Mutex::new(entity))
        });
        state.order.push(id);
        log::debug!("Created entity '{name}' ({id:?})");
        id
    }

    /// Remove an entity and its descendants.
    ///
    /// Every component is deactivated before it is destroyed; the active
    /// camera is cleared when it goes with them.
    pub fn remove_entity(&self, id: EntityId) -> bool {
        let _guard = self.barrier.lock();
        let mut guard = self.state.write();
        let state = &mut *guard;

        let Some(root) = state.entity(id) else {
            return false;
        };
        let parent = root.lock().core().parent();
        if let Some(parent) = parent.and_then(|p| state.entities.get(p)) {
            parent.lock().core_mut().remove_child(id);
        }

        let mut stack = vec![id];
        let mut removed = 0;
        while let Some(current) = stack.pop() {
            let Some(shared) = state.entities.remove(current) else {
                continue;
            };
            let mut entity = shared.lock();
            stack.extend_from_slice(entity.core().children());

            let mut sink = IndexSink {
                registry: &mut state.registry,
                pending: &mut state.pending,
            };
            entity.deactivate_all(&mut sink, Some(self.events.as_ref()));
            if state.camera == Some(current) {
                state.camera = None;
                log::debug!("Active camera removed with entity '{}'", entity.name());
            }
            removed += 1;
        }

        state.order.retain(|entity| state.entities.contains_key(*entity));
        state.reindex();
        log::debug!("Removed {removed} entities");
        true
    }

    /// Make `parent` the parent of `child` (`None` detaches); false when an
    /// entity is missing or the link would create a cycle
    pub fn set_parent(&self, child: EntityId, parent: Option<EntityId>) -> bool {
        let _guard = self.barrier.lock();
        let state = self.state.read();

        let Some(child_entity) = state.entity(child) else {
            return false;
        };
        if let Some(parent) = parent {
            let mut cursor = state.entities.contains_key(parent).then_some(parent);
            if cursor.is_none() {
                return false;
            }
            while let Some(current) = cursor {
                if current == child {
                    log::warn!("Parenting {child:?} under {parent:?} would create a cycle");
                    return false;
                }
                cursor = state.entities.get(current).and_then(|e| e.lock().core().parent());
            }
        }

        let previous = child_entity.lock().core().parent();
        if let Some(previous) = previous.and_then(|p| state.entities.get(p)) {
            previous.lock().core_mut().remove_child(child);
        }
        if let Some(parent) = parent.and_then(|p| state.entities.get(p)) {
            parent.lock().core_mut().add_child(child);
        }
        child_entity.lock().core_mut().set_parent(parent);
        true
    }

    /// Run `f` with one entity locked
    pub fn with_entity<R>(&self, id: EntityId, f: impl FnOnce(&mut Entity) -> R) -> Option<R> {
        let entity = self.state.read().entity(id)?;
        let mut entity = entity.lock();
        Some(f(&mut entity))
    }

    /// Run `f` on one component with its entity locked. Drawables may
    /// change their bounds, so their entity is relocated on the next
    /// synchronize.
    pub fn with_component<T, R>(&self, id: EntityId, f: impl FnOnce(&mut T) -> R) -> Option<R>
    where
        T: Component + Named,
    {
        self.with_entity(id, |entity| {
            let component = entity.get_mut::<T>()?;
            let drawable = component.as_drawable().is_some();
            let result = f(component);
            if drawable {
                entity.core_mut().mark_dirty();
            }
            Some(result)
        })
        .flatten()
    }

    /// Replace an entity's local transform
    pub fn set_transform(&self, id: EntityId, transform: Transform) -> bool {
        self.with_entity(id, |entity| entity.core_mut().set_transform(transform))
            .is_some()
    }

    /// Number of entities
    pub fn entity_count(&self) -> usize {
        self.state.read().order.len()
    }

    /// Entity ids in dense order
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.state.read().order.clone()
    }

    /// Whether `id` names a live entity
    pub fn contains(&self, id: EntityId) -> bool {
        self.state.read().entities.contains_key(id)
    }

    /// First entity with `name` in dense order
    pub fn find_entity(&self, name: &str) -> Option<EntityId> {
        let state = self.state.read();
        state
            .order
            .iter()
            .copied()
            .find(|id| state.entities.get(*id).is_some_and(|e| e.lock().name() == name))
    }

    // ---- Components ----------------------------------------------------

    /// Lock the barrier and the state, then run `f` on one entity with an
    /// index sink and the active camera slot
    fn mutate<R>(
        &self,
        id: EntityId,
        f: impl FnOnce(&mut Entity, &mut IndexSink<'_>, &mut Option<EntityId>) -> R,
    ) -> Option<R> {
        let _guard = self.barrier.lock();
        let mut guard = self.state.write();
        let state = &mut *guard;

        let Some(shared) = state.entity(id) else {
            log::warn!("Unknown entity {id:?}");
            return None;
        };
        let mut entity = shared.lock();
        let mut sink = IndexSink {
            registry: &mut state.registry,
            pending: &mut state.pending,
        };
        Some(f(&mut entity, &mut sink, &mut state.camera))
    }

    /// Attach a component, replacing (and destroying) one of the same type
    pub fn add_component(&self, id: EntityId, component: Box<dyn Component>) -> bool {
        let events = self.events.as_ref();
        self.mutate(id, |entity, sink, _| {
            let key = component.type_key();
            if entity.attach(component, sink, Some(events)).is_some() {
                log::debug!("Replaced component {key:?} on '{}'", entity.name());
            }
        })
        .is_some()
    }

    /// Attach a component by value
    pub fn add<T: Component>(&self, id: EntityId, component: T) -> bool {
        self.add_component(id, Box::new(component))
    }

    /// Construct a component through the factory and attach it
    pub fn spawn_component(&self, id: EntityId, key: TypeKey) -> bool {
        match self.factory.create(key) {
            Some(component) => self.add_component(id, component),
            None => false,
        }
    }

    /// Activate or deactivate a component; false when unchanged or missing
    pub fn set_active(&self, id: EntityId, key: TypeKey, enabled: bool) -> bool {
        let events = self.events.as_ref();
        self.mutate(id, |entity, sink, _| entity.set_active(key, enabled, sink, Some(events)))
            .unwrap_or(false)
    }

    /// Deactivate and destroy a component; detaches the active camera when
    /// it was the camera
    pub fn remove_component(&self, id: EntityId, key: TypeKey) -> bool {
        let events = self.events.as_ref();
        self.mutate(id, |entity, sink, camera| {
            let Some(component) = entity.detach(key, sink, Some(events)) else {
                return false;
            };
            if key == Camera::KEY && *camera == Some(id) {
                *camera = None;
                log::debug!("Active camera detached from '{}'", entity.name());
            }
            drop(component);
            true
        })
        .unwrap_or(false)
    }

    // ---- Camera --------------------------------------------------------

    /// Render through the camera of `id`; it must hold an active [`Camera`]
    pub fn set_camera(&self, id: EntityId) -> bool {
        let _guard = self.barrier.lock();
        let mut state = self.state.write();
        let has_camera = state
            .entities
            .get(id)
            .is_some_and(|e| e.lock().is_active(Camera::KEY) == Some(true));
        if !has_camera {
            log::warn!("Entity {id:?} has no active camera");
            return false;
        }
        state.camera = Some(id);
        true
    }

    /// Entity of the active camera
    pub fn camera(&self) -> Option<EntityId> {
        self.state.read().camera
    }

    /// Pipeline and snapshot of the active camera
    fn camera_view(&self) -> Option<(Arc<Mutex<RenderSystem>>, Viewer)> {
        let shared = {
            let state = self.state.read();
            state.camera.and_then(|id| state.entity(id))?
        };
        let entity = shared.lock();
        if entity.is_active(Camera::KEY) != Some(true) {
            return None;
        }
        let camera = entity.get::<Camera>()?;
        Some((camera.render_system(), camera.viewer(entity.core())))
    }

    /// Snapshot of the active camera
    pub fn viewer(&self) -> Option<Viewer> {
        self.camera_view().map(|(_, viewer)| viewer)
    }

    /// Empty render system wired to this scene's device and caches
    pub fn create_render_system(&self) -> RenderSystem {
        RenderSystem::new(StageSetup {
            device: self.device.clone(),
            caches: self.caches.clone(),
            config: self.render_config.clone(),
        })
    }

    // ---- Phases --------------------------------------------------------

    /// Step the physics collaborator
    pub fn simulate(&self, dt: f32) {
        let _phase = self.barrier.begin_phase(Phase::Simulation);
        if let Some(physics) = self.physics.lock().as_mut() {
            physics.step(dt);
        }
    }

    /// Flush transform changes into world matrices and spatial bounds.
    ///
    /// A child is refreshed whenever its parent was. Active components of
    /// every refreshed entity are notified afterwards.
    pub fn synchronize(&self) {
        let _phase = self.barrier.begin_phase(Phase::Synchronize);
        let poses = self
            .physics
            .lock()
            .as_mut()
            .map(|physics| physics.drain_poses())
            .unwrap_or_default();

        let mut guard = self.state.write();
        let state = &mut *guard;

        for pose in poses {
            if let Some(entity) = state.entities.get(pose.entity) {
                entity.lock().core_mut().set_transform(pose.transform);
            }
        }

        let mut stack: Vec<(EntityId, Option<Mat4>, bool)> = state
            .order
            .iter()
            .rev()
            .filter(|id| {
                state
                    .entities
                    .get(**id)
                    .is_some_and(|e| e.lock().core().parent().is_none())
            })
            .map(|id| (*id, None, false))
            .collect();

        let mut changed = Vec::new();
        while let Some((id, parent_world, parent_changed)) = stack.pop() {
            let Some(shared) = state.entities.get(id) else {
                continue;
            };
            let mut entity = shared.lock();
            let refresh = parent_changed || entity.core().is_dirty();
            if refresh {
                entity.core_mut().refresh_world(parent_world.as_ref());
                let moved: Vec<(TypeKey, Sphere)> = entity
                    .active_keys()
                    .filter_map(|key| entity.drawable_entry(key).map(|(_, sphere)| (key, sphere)))
                    .collect();
                for (key, sphere) in moved {
                    state.registry.relocate(ComponentRef::new(id, key), sphere);
                }
                changed.push(Arc::clone(shared));
            }

            let world = *entity.core().world_matrix();
            stack.extend(
                entity
                    .core()
                    .children()
                    .iter()
                    .rev()
                    .map(|child| (*child, Some(world), refresh)),
            );
        }

        state.reindex();
        drop(guard);

        log::trace!("Synchronized {} entities", changed.len());
        for entity in changed {
            entity.lock().synchronize(Some(self.events.as_ref()));
        }
    }

    /// Update active components, refresh camera distances and dispatch
    /// up to `events_per_update` queued events
    pub fn update(&self, time: f32) {
        let _phase = self.barrier.begin_phase(Phase::Update);

        let (work, camera) = {
            let state = self.state.read();
            let mut keys: BTreeMap<EntityId, Vec<TypeKey>> = BTreeMap::new();
            for component in &state.pending {
                keys.entry(component.entity).or_default().push(component.key);
            }
            let work: Vec<(SharedEntity, Vec<TypeKey>)> = state
                .order
                .iter()
                .filter_map(|id| {
                    let entity = state.entity(*id)?;
                    Some((entity, keys.remove(id).unwrap_or_default()))
                })
                .collect();
            (work, state.camera.and_then(|id| state.entity(id)))
        };
        let eye = camera.as_ref().map(|camera| camera.lock().core().world_position());

        let chunk_size = work.len().div_ceil(self.workers.thread_count().max(1)).max(1);
        let mut work = work.into_iter().peekable();
        let mut watches = Vec::new();
        while work.peek().is_some() {
            let chunk: Vec<_> = work.by_ref().take(chunk_size).collect();
            let events = Arc::clone(&self.events);
            watches.push(self.workers.watch(move || {
                for (entity, keys) in chunk {
                    let mut entity = entity.lock();
                    entity.update(&keys, time, Some(events.as_ref()));
                    let distance = eye.map_or(f32::INFINITY, |eye| {
                        (entity.core().world_position() - eye).magnitude()
                    });
                    entity.core_mut().set_distance(distance);
                }
            }));
        }
        let chunks = await_all(watches).len();

        let dispatched = self.dispatch_events(self.config.events_per_update);
        log::trace!("Updated {chunks} chunks, dispatched {dispatched} events");
    }

    /// Render one frame through the active camera; false when there is none
    pub fn render(&self, time: f32) -> bool {
        let _phase = self.barrier.begin_phase(Phase::Render);

        if let Some(device) = &self.device {
            let mut state = self.state.write();
            state.materials.upload(device.as_ref());
            if let Some(display) = &state.display {
                display.clear(device.as_ref());
            }
        }

        let Some((system, viewer)) = self.camera_view() else {
            log::trace!("No active camera, frame skipped");
            return false;
        };
        system.lock().render_frame(self, &viewer, time);
        true
    }

    /// Run simulate, synchronize, update and render once
    pub fn tick(&self, dt: f32, time: f32) -> bool {
        self.simulate(dt);
        self.synchronize();
        self.update(time);
        self.render(time)
    }

    /// Rebuild every per-type index from the active components, dispatch
    /// the events queued so far, then reassign dense indices.
    ///
    /// Meant to follow bulk edits.
    pub fn actualize(&self) {
        let _guard = self.barrier.lock();
        let queued = self.events.len();

        {
            let mut guard = self.state.write();
            let state = &mut *guard;
            state.registry.clear();
            state.pending.clear();
            for id in &state.order {
                let Some(entity) = state.entities.get(*id) else {
                    continue;
                };
                let entity = entity.lock();
                for key in entity.active_keys() {
                    let component = ComponentRef::new(*id, key);
                    state.registry.insert(component, entity.drawable_entry(key));
                    state.pending.insert(component);
                }
            }
        }

        let dispatched = self.dispatch_events(queued);
        self.state.read().reindex();
        log::debug!("Actualized scene, dispatched {dispatched} events");
    }

    // ---- Events --------------------------------------------------------

    /// Queue an event for deferred dispatch
    pub fn post_event(&self, event: Event) {
        self.events.push(event);
    }

    /// Number of queued events
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Register a listener for events named `name`
    pub fn listen(&self, name: impl Into<String>, listener: impl EventListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push(Listener {
            id,
            name: name.into(),
            handler: Box::new(listener),
        });
        id
    }

    /// Remove a listener; false when it was not registered
    pub fn unlisten(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|listener| listener.id != id);
        listeners.len() != before
    }

    /// Dispatch up to `limit` queued events; returns how many were dispatched
    fn dispatch_events(&self, limit: usize) -> usize {
        (0..limit).take_while(|_| self.dispatch_last_event()).count()
    }

    /// Pop the oldest queued event and deliver it: first to the active
    /// components under its target, then to every listener registered for
    /// its name. False when the queue was empty.
    ///
    /// Listeners must not register or remove listeners.
    pub fn dispatch_last_event(&self) -> bool {
        let Some(event) = self.events.pop() else {
            return false;
        };

        let targets: Vec<(SharedEntity, Option<TypeKey>)> = {
            let state = self.state.read();
            match event.target() {
                EventTarget::Scene => state
                    .order
                    .iter()
                    .filter_map(|id| state.entity(*id))
                    .map(|entity| (entity, None))
                    .collect(),
                EventTarget::Entity(id) => state.entity(id).map(|e| (e, None)).into_iter().collect(),
                EventTarget::Component(component) => state
                    .entity(component.entity)
                    .map(|e| (e, Some(component.key)))
                    .into_iter()
                    .collect(),
            }
        };

        let reached: usize = targets
            .into_iter()
            .map(|(entity, only)| entity.lock().dispatch(&event, only, Some(self.events.as_ref())))
            .sum();

        let mut listeners = self.listeners.lock();
        let handled = listeners
            .iter_mut()
            .filter(|listener| listener.name == event.name())
            .map(|listener| listener.handler.on_event(&event))
            .filter(|handled| *handled)
            .count();

        log::trace!(
            "Dispatched event '{}' to {reached} components, {handled} listeners handled it",
            event.name()
        );
        true
    }

    // ---- Materials -----------------------------------------------------

    /// Add or replace a material by name
    pub fn add_material(&self, material: Material) -> MaterialId {
        let _guard = self.barrier.lock();
        self.state.write().materials.add(material)
    }

    /// Material by id
    pub fn material(&self, id: MaterialId) -> Option<Arc<Material>> {
        self.state.read().materials.get(id)
    }

    /// Material id by name
    pub fn find_material(&self, name: &str) -> Option<MaterialId> {
        self.state.read().materials.find(name)
    }

    /// Number of materials
    pub fn material_count(&self) -> usize {
        self.state.read().materials.len()
    }

    /// Upload the material table if it changed; false without a device or
    /// when the upload failed
    pub fn upload_materials(&self) -> bool {
        let Some(device) = &self.device else {
            return false;
        };
        self.state.write().materials.upload(device.as_ref())
    }

    // ---- Display -------------------------------------------------------

    /// Recreate the display targets at `width`x`height` scaled by `quality`.
    ///
    /// False without a device or when creation failed.
    pub fn configure_display(&self, width: u32, height: u32, quality: f32) -> bool {
        let Some(device) = &self.device else {
            log::debug!("No render device, display configuration skipped");
            return false;
        };
        let _guard = self.barrier.lock();
        let mut state = self.state.write();
        if let Some(previous) = state.display.take() {
            previous.destroy(device.as_ref());
        }
        state.display = DisplayTargets::create(device.as_ref(), width, height, quality);
        state.display.is_some()
    }

    /// Recreate the display targets from the render configuration
    pub fn reset_display(&self) -> bool {
        let RenderConfig {
            width,
            height,
            quality,
            ..
        } = self.render_config;
        self.configure_display(width, height, quality)
    }

    /// Clear the display targets; false when there are none
    pub fn clear_display(&self) -> bool {
        let Some(device) = &self.device else {
            return false;
        };
        let state = self.state.read();
        let Some(display) = &state.display else {
            return false;
        };
        display.clear(device.as_ref());
        true
    }

    /// Output target
    pub fn display_output(&self) -> Option<TargetHandle> {
        self.state.read().display.as_ref().map(DisplayTargets::output)
    }

    /// G-buffer target
    pub fn display_gbuffer(&self) -> Option<TargetHandle> {
        self.state.read().display.as_ref().map(DisplayTargets::gbuffer)
    }

    /// Display size in pixels
    pub fn display_size(&self) -> Option<(u32, u32)> {
        self.state.read().display.as_ref().map(DisplayTargets::size)
    }

    // ---- Index access --------------------------------------------------

    /// Entities whose component `key` passes the filter and spatial test
    pub(crate) fn candidates(
        &self,
        key: TypeKey,
        filter: IndexFilter,
        spatial: SpatialQuery<'_>,
    ) -> Vec<SharedEntity> {
        let state = self.state.read();
        let Some(index) = state.registry.index(key) else {
            return Vec::new();
        };
        index
            .query(filter, spatial)
            .into_iter()
            .filter_map(|id| state.entity(id))
            .collect()
    }

    /// Entities with an indexed component of `key` accepted by `filter`
    pub fn indexed(&self, key: TypeKey, filter: IndexFilter) -> Vec<EntityId> {
        self.state
            .read()
            .registry
            .index(key)
            .map(|index| index.query(filter, SpatialQuery::Everything))
            .unwrap_or_default()
    }

    /// Active components awaiting update
    pub fn pending_count(&self) -> usize {
        self.state.read().pending.len()
    }

    // ---- Access --------------------------------------------------------

    /// Take the barrier exclusively
    pub fn lock(&self) -> BarrierGuard<'_> {
        self.barrier.lock()
    }

    /// Enter a phase
    pub fn begin_phase(&self, phase: Phase) -> PhaseGuard<'_> {
        self.barrier.begin_phase(phase)
    }

    /// The barrier
    pub fn barrier(&self) -> &SceneBarrier {
        &self.barrier
    }

    /// Render device
    pub fn device(&self) -> Option<&Arc<dyn RenderDevice>> {
        self.device.as_ref()
    }

    /// Shader and primitive caches
    pub fn caches(&self) -> Option<&ResourceCaches> {
        self.caches.as_ref()
    }

    /// Component constructors
    pub fn factory(&self) -> &Arc<ComponentFactory> {
        &self.factory
    }

    /// Scene configuration
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Render configuration
    pub fn render_config(&self) -> &RenderConfig {
        &self.render_config
    }
}

impl Drop for SceneGraph {
    fn drop(&mut self) {
        let Some(device) = &self.device else {
            return;
        };
        let state = self.state.get_mut();
        if let Some(display) = state.display.take() {
            display.destroy(device.as_ref());
        }
        state.materials.release(device.as_ref());
    }
}

impl fmt::Debug for SceneGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("SceneGraph")
            .field("entities", &state.order.len())
            .field("indexed", &state.registry.total())
            .field("materials", &state.materials.len())
            .field("camera", &state.camera)
            .field("events", &self.events.len())
            .field("device", &self.device.is_some())
            .finish_non_exhaustive()
    }
}

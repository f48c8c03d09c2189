//! Entities and the component composition protocol
//!
//! An entity is a node in the transform hierarchy holding at most one
//! component per [`TypeKey`]. Attaching a component of an existing type
//! replaces the old one. Index bookkeeping is reported through
//! [`Membership`] so the entity stays independent of the scene that owns it.

use std::collections::BTreeMap;
use std::fmt;

use super::component::{Component, ComponentCx};
use super::drawable::Category;
use super::type_key::{Named, TypeKey};
use crate::events::{Event, EventQueue};
use crate::foundation::math::{rotation_of, translation_of, Mat4, Quat, Transform, Vec3};
use crate::spatial::Sphere;

slotmap::new_key_type! {
    /// Stable entity identifier
    pub struct EntityId;
}

/// Name, transform and hierarchy data of an entity
#[derive(Debug, Clone)]
pub struct EntityCore {
    name: String,
    tag: String,
    index: usize,
    transform: Transform,
    world: Mat4,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
    distance: f32,
    dirty: bool,
}

impl EntityCore {
    fn new(name: String) -> Self {
        Self {
            name,
            tag: String::new(),
            index: 0,
            transform: Transform::identity(),
            world: Mat4::identity(),
            parent: None,
            children: Vec::new(),
            distance: f32::INFINITY,
            dirty: true,
        }
    }

    /// Entity name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-form tag
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Set the tag
    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = tag.into();
    }

    /// Dense index inside the scene, reassigned on every reindex
    pub fn index(&self) -> usize {
        self.index
    }

    /// Local transform
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Replace the local transform; world data refreshes on the next synchronize
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.dirty = true;
    }

    /// World matrix as of the last synchronize
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world
    }

    /// World position as of the last synchronize
    pub fn world_position(&self) -> Vec3 {
        translation_of(&self.world)
    }

    /// World rotation as of the last synchronize
    pub fn world_rotation(&self) -> Quat {
        rotation_of(&self.world)
    }

    /// Parent entity
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Child entities
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    /// Distance to the active camera computed by the last update
    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Whether transform or composition changed since the last synchronize
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub(crate) fn set_distance(&mut self, distance: f32) {
        self.distance = distance;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<EntityId>) {
        self.parent = parent;
        self.dirty = true;
    }

    pub(crate) fn add_child(&mut self, child: EntityId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    pub(crate) fn remove_child(&mut self, child: EntityId) {
        self.children.retain(|c| *c != child);
    }

    /// Recompute the world matrix from the parent's; returns the new matrix
    pub(crate) fn refresh_world(&mut self, parent_world: Option<&Mat4>) -> Mat4 {
        let local = self.transform.to_matrix();
        self.world = parent_world.map_or(local, |parent| parent * local);
        self.dirty = false;
        self.world
    }
}

/// A component plus its activation flag
pub struct ComponentSlot {
    component: Box<dyn Component>,
    active: bool,
}

impl ComponentSlot {
    /// The component
    pub fn component(&self) -> &dyn Component {
        self.component.as_ref()
    }

    /// Whether the component is active
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Receiver of index membership changes caused by activation
pub(crate) trait Membership {
    /// A component became active; drawables report category and world bounds
    fn joined(&mut self, entity: EntityId, key: TypeKey, drawable: Option<(Category, Sphere)>);

    /// A component became inactive
    fn left(&mut self, entity: EntityId, key: TypeKey);
}

/// Node of the scene holding typed components
pub struct Entity {
    id: EntityId,
    core: EntityCore,
    components: BTreeMap<TypeKey, ComponentSlot>,
}

impl Entity {
    pub(crate) fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            core: EntityCore::new(name.into()),
            components: BTreeMap::new(),
        }
    }

    /// Identifier
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Name, transform and hierarchy data
    pub fn core(&self) -> &EntityCore {
        &self.core
    }

    /// Mutable name, transform and hierarchy data
    pub fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    /// Entity name
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Number of attached components
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Keys of attached components
    pub fn keys(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.components.keys().copied()
    }

    /// Keys of active components
    pub fn active_keys(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.components
            .iter()
            .filter(|(_, slot)| slot.active)
            .map(|(key, _)| *key)
    }

    /// Whether a component of `key` is attached
    pub fn contains(&self, key: TypeKey) -> bool {
        self.components.contains_key(&key)
    }

    /// Activation state of the component of `key`
    pub fn is_active(&self, key: TypeKey) -> Option<bool> {
        self.components.get(&key).map(ComponentSlot::is_active)
    }

    /// Component by key
    pub fn component(&self, key: TypeKey) -> Option<&dyn Component> {
        self.components.get(&key).map(ComponentSlot::component)
    }

    /// Component by type
    pub fn get<T: Component + Named>(&self) -> Option<&T> {
        self.component(T::KEY).and_then(|c| c.downcast_ref::<T>())
    }

    /// Mutable component by type
    pub fn get_mut<T: Component + Named>(&mut self) -> Option<&mut T> {
        self.components
            .get_mut(&T::KEY)
            .and_then(|slot| slot.component.downcast_mut::<T>())
    }

    /// Core data and a component borrowed together
    pub fn split_mut<T: Component + Named>(&mut self) -> Option<(&mut EntityCore, &mut T)> {
        let component = self
            .components
            .get_mut(&T::KEY)
            .and_then(|slot| slot.component.downcast_mut::<T>())?;
        Some((&mut self.core, component))
    }

    /// Run `f` on one slot with a context over the rest of the entity
    fn with_slot<R>(
        &mut self,
        key: TypeKey,
        events: Option<&EventQueue>,
        f: impl FnOnce(&mut ComponentSlot, &mut ComponentCx<'_>) -> R,
    ) -> Option<R> {
        let mut slot = self.components.remove(&key)?;
        let result = {
            let mut cx = ComponentCx::new(self.id, &mut self.core, &self.components, events);
            f(&mut slot, &mut cx)
        };
        self.components.insert(key, slot);
        Some(result)
    }

    /// Attach a component, replacing any component of the same type.
    ///
    /// The new component is inserted inactive, every component on the entity
    /// is woken (the new one with `None`, the others with the new key), and
    /// the new component is activated. Returns the replaced component, already
    /// deactivated, so the caller decides when it is destroyed.
    pub(crate) fn attach(
        &mut self,
        component: Box<dyn Component>,
        membership: &mut dyn Membership,
        events: Option<&EventQueue>,
    ) -> Option<Box<dyn Component>> {
        let key = component.type_key();
        let replaced = self.detach(key, membership, events);

        self.components.insert(key, ComponentSlot { component, active: false });

        let keys: Vec<TypeKey> = self.components.keys().copied().collect();
        for sibling in keys {
            let other = (sibling != key).then_some(key);
            self.with_slot(sibling, events, |slot, cx| slot.component.awake(cx, other));
        }

        self.set_active(key, true, membership, events);
        self.core.mark_dirty();

        log::debug!("Entity '{}' attached component {key:?}", self.core.name());
        replaced
    }

    /// Activate or deactivate a component; false when unchanged or missing
    pub(crate) fn set_active(
        &mut self,
        key: TypeKey,
        enabled: bool,
        membership: &mut dyn Membership,
        events: Option<&EventQueue>,
    ) -> bool {
        match self.components.get(&key) {
            Some(slot) if slot.active != enabled => {}
            _ => return false,
        }

        let drawable = self
            .with_slot(key, events, |slot, cx| {
                slot.active = enabled;
                if enabled {
                    slot.component.awake(cx, None);
                    slot.component
                        .as_drawable()
                        .map(|d| (d.category(), d.world_sphere(cx.core.world_matrix())))
                } else {
                    slot.component.asleep(cx);
                    None
                }
            })
            .flatten();

        if enabled {
            membership.joined(self.id, key, drawable);
        } else {
            membership.left(self.id, key);
        }
        true
    }

    /// Deactivate and remove a component
    pub(crate) fn detach(
        &mut self,
        key: TypeKey,
        membership: &mut dyn Membership,
        events: Option<&EventQueue>,
    ) -> Option<Box<dyn Component>> {
        if !self.components.contains_key(&key) {
            return None;
        }
        self.set_active(key, false, membership, events);
        let slot = self.components.remove(&key)?;
        self.core.mark_dirty();
        Some(slot.component)
    }

    /// Deactivate every component
    pub(crate) fn deactivate_all(&mut self, membership: &mut dyn Membership, events: Option<&EventQueue>) {
        let keys: Vec<TypeKey> = self.active_keys().collect();
        for key in keys {
            self.set_active(key, false, membership, events);
        }
    }

    /// Update the given components that are still active
    pub(crate) fn update(&mut self, keys: &[TypeKey], time: f32, events: Option<&EventQueue>) {
        for key in keys {
            if self.is_active(*key) == Some(true) {
                self.with_slot(*key, events, |slot, cx| slot.component.update(cx, time));
            }
        }
    }

    /// Notify active components that world data was refreshed
    pub(crate) fn synchronize(&mut self, events: Option<&EventQueue>) {
        let keys: Vec<TypeKey> = self.active_keys().collect();
        for key in keys {
            self.with_slot(key, events, |slot, cx| slot.component.synchronize(cx));
        }
    }

    /// Deliver an event to active components (or only to `only`); returns
    /// the number of components reached
    pub(crate) fn dispatch(&mut self, event: &Event, only: Option<TypeKey>, events: Option<&EventQueue>) -> usize {
        let keys: Vec<TypeKey> = match only {
            Some(key) => self.is_active(key).filter(|a| *a).map(|_| key).into_iter().collect(),
            None => self.active_keys().collect(),
        };
        for key in &keys {
            self.with_slot(*key, events, |slot, cx| slot.component.on_event(cx, event));
        }
        keys.len()
    }

    /// Category and current world sphere of an active drawable component
    pub(crate) fn drawable_entry(&self, key: TypeKey) -> Option<(Category, Sphere)> {
        let slot = self.components.get(&key).filter(|s| s.active)?;
        slot.component
            .as_drawable()
            .map(|d| (d.category(), d.world_sphere(self.core.world_matrix())))
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("name", &self.core.name())
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[derive(Default)]
    struct Trace {
        joined: Vec<TypeKey>,
        left: Vec<TypeKey>,
    }

    impl Membership for Trace {
        fn joined(&mut self, _entity: EntityId, key: TypeKey, _drawable: Option<(Category, Sphere)>) {
            self.joined.push(key);
        }

        fn left(&mut self, _entity: EntityId, key: TypeKey) {
            self.left.push(key);
        }
    }

    #[derive(Default)]
    struct Health {
        value: i32,
        awake: Vec<Option<TypeKey>>,
        asleep: usize,
    }

    impl Named for Health {
        const NAME: &'static str = "Health";
    }

    impl Component for Health {
        fn type_key(&self) -> TypeKey {
            Self::KEY
        }

        fn awake(&mut self, _cx: &mut ComponentCx<'_>, other: Option<TypeKey>) {
            self.awake.push(other);
        }

        fn asleep(&mut self, _cx: &mut ComponentCx<'_>) {
            self.asleep += 1;
        }

        fn update(&mut self, cx: &mut ComponentCx<'_>, _time: f32) {
            if let Some(armor) = cx.sibling::<Armor>() {
                self.value += armor.rating;
            }
        }
    }

    struct Armor {
        rating: i32,
        woken_by: Vec<Option<TypeKey>>,
    }

    impl Named for Armor {
        const NAME: &'static str = "Armor";
    }

    impl Component for Armor {
        fn type_key(&self) -> TypeKey {
            Self::KEY
        }

        fn awake(&mut self, _cx: &mut ComponentCx<'_>, other: Option<TypeKey>) {
            self.woken_by.push(other);
        }
    }

    fn entity() -> Entity {
        let mut ids: SlotMap<EntityId, ()> = SlotMap::with_key();
        Entity::new(ids.insert(()), "player")
    }

    #[test]
    fn test_attach_wakes_every_component() {
        let mut entity = entity();
        let mut trace = Trace::default();

        entity.attach(Box::new(Health::default()), &mut trace, None);
        entity.attach(Box::new(Armor { rating: 2, woken_by: Vec::new() }), &mut trace, None);

        let health = entity.get::<Health>().unwrap();
        assert_eq!(health.awake, vec![None, None, Some(Armor::KEY)]);
        let armor = entity.get::<Armor>().unwrap();
        assert_eq!(armor.woken_by, vec![None, None]);
        assert_eq!(trace.joined, vec![Health::KEY, Armor::KEY]);
        assert!(entity.core().is_dirty());
    }

    #[test]
    fn test_attach_replaces_same_type() {
        let mut entity = entity();
        let mut trace = Trace::default();

        entity.attach(Box::new(Health { value: 1, ..Health::default() }), &mut trace, None);
        let replaced = entity.attach(Box::new(Health { value: 2, ..Health::default() }), &mut trace, None);

        let replaced = replaced.unwrap();
        let replaced = replaced.downcast_ref::<Health>().unwrap();
        assert_eq!(replaced.value, 1);
        assert_eq!(replaced.asleep, 1);
        assert_eq!(entity.component_count(), 1);
        assert_eq!(entity.get::<Health>().unwrap().value, 2);
        assert_eq!(trace.left, vec![Health::KEY]);
    }

    #[test]
    fn test_set_active_is_idempotent() {
        let mut entity = entity();
        let mut trace = Trace::default();
        entity.attach(Box::new(Health::default()), &mut trace, None);

        assert!(!entity.set_active(Health::KEY, true, &mut trace, None));
        assert!(entity.set_active(Health::KEY, false, &mut trace, None));
        assert!(!entity.set_active(Health::KEY, false, &mut trace, None));
        assert!(entity.set_active(Health::KEY, true, &mut trace, None));

        assert_eq!(entity.get::<Health>().unwrap().asleep, 1);
        assert_eq!(trace.joined.len(), 2);
        assert_eq!(trace.left.len(), 1);
    }

    #[test]
    fn test_update_sees_siblings_and_skips_inactive() {
        let mut entity = entity();
        let mut trace = Trace::default();
        entity.attach(Box::new(Health::default()), &mut trace, None);
        entity.attach(Box::new(Armor { rating: 3, woken_by: Vec::new() }), &mut trace, None);

        entity.update(&[Health::KEY], 0.0, None);
        assert_eq!(entity.get::<Health>().unwrap().value, 3);

        entity.set_active(Health::KEY, false, &mut trace, None);
        entity.update(&[Health::KEY], 0.0, None);
        assert_eq!(entity.get::<Health>().unwrap().value, 3);
    }

    #[test]
    fn test_detach_missing_component() {
        let mut entity = entity();
        let mut trace = Trace::default();
        assert!(entity.detach(Health::KEY, &mut trace, None).is_none());
        assert!(trace.left.is_empty());
    }
}

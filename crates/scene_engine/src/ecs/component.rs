//! Component trait and lifecycle context
//!
//! Components are constructed inactive, attached to exactly one entity,
//! activated through [`Component::awake`] and deactivated through
//! [`Component::asleep`]. Callbacks receive a [`ComponentCx`] that exposes
//! the owning entity's core data and its sibling components.

use std::any::Any;
use std::collections::BTreeMap;

use super::drawable::Drawable;
use super::entity::{ComponentSlot, EntityCore, EntityId};
use super::type_key::{Named, TypeKey};
use crate::events::{Event, EventQueue};

/// Access to a value as [`Any`] for downcasting
pub trait AsAny {
    /// Borrow as `Any`
    fn as_any(&self) -> &dyn Any;
    /// Mutably borrow as `Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Unit of behaviour attached to an entity
///
/// Implementors also implement [`Named`]; `type_key` returns `Self::KEY`.
pub trait Component: AsAny + Send + 'static {
    /// Runtime type id
    fn type_key(&self) -> TypeKey;

    /// Called when a component on the owning entity changed.
    ///
    /// `other` is the key of a newly attached sibling, or `None` when this
    /// component itself is being attached or activated.
    fn awake(&mut self, _cx: &mut ComponentCx<'_>, _other: Option<TypeKey>) {}

    /// Called when the component is deactivated
    fn asleep(&mut self, _cx: &mut ComponentCx<'_>) {}

    /// Per-tick update for active components
    fn update(&mut self, _cx: &mut ComponentCx<'_>, _time: f32) {}

    /// Called after world transforms were refreshed
    fn synchronize(&mut self, _cx: &mut ComponentCx<'_>) {}

    /// Deliver a dispatched event
    fn on_event(&mut self, _cx: &mut ComponentCx<'_>, _event: &Event) {}

    /// View as a drawable, if this component renders
    fn as_drawable(&self) -> Option<&dyn Drawable> {
        None
    }

    /// Mutable view as a drawable
    fn as_drawable_mut(&mut self) -> Option<&mut dyn Drawable> {
        None
    }
}

impl<'a> dyn Component + 'a {
    /// Downcast to a concrete component type
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably downcast to a concrete component type
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Context handed to component callbacks
pub struct ComponentCx<'a> {
    /// Owning entity
    pub entity: EntityId,
    /// Owning entity's name, transform and hierarchy data
    pub core: &'a mut EntityCore,
    siblings: &'a BTreeMap<TypeKey, ComponentSlot>,
    events: Option<&'a EventQueue>,
}

impl<'a> ComponentCx<'a> {
    pub(crate) fn new(
        entity: EntityId,
        core: &'a mut EntityCore,
        siblings: &'a BTreeMap<TypeKey, ComponentSlot>,
        events: Option<&'a EventQueue>,
    ) -> Self {
        Self {
            entity,
            core,
            siblings,
            events,
        }
    }

    /// Another component on the same entity
    pub fn sibling<T: Component + Named>(&self) -> Option<&T> {
        self.siblings
            .get(&T::KEY)
            .and_then(|slot| slot.component().downcast_ref::<T>())
    }

    /// Whether the entity holds an active component of `key`
    pub fn has_active(&self, key: TypeKey) -> bool {
        self.siblings.get(&key).is_some_and(ComponentSlot::is_active)
    }

    /// Queue an event for deferred dispatch; false when no queue is attached
    pub fn post(&self, event: Event) -> bool {
        match self.events {
            Some(queue) => {
                queue.push(event);
                true
            }
            None => false,
        }
    }
}

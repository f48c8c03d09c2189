//! Entity/component model
//!
//! Entities own their components; per-type indices live in the
//! [`ComponentRegistry`] owned by the scene. Type identity comes from
//! declared names hashed into [`TypeKey`]s.

pub mod component;
pub mod drawable;
pub mod entity;
pub mod factory;
pub mod registry;
pub mod type_key;

pub use component::{AsAny, Component, ComponentCx};
pub use drawable::{Appearance, Category, Drawable, SurfaceKey, Surfaces};
pub use entity::{ComponentSlot, Entity, EntityCore, EntityId};
pub(crate) use entity::Membership;
pub use factory::ComponentFactory;
pub use registry::{ComponentIndex, ComponentRef, ComponentRegistry, IndexFilter, SpatialQuery};
pub use type_key::{Named, TypeKey};

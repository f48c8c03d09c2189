//! Per-type component indices
//!
//! The scene keeps one [`ComponentIndex`] per component type. An index lists
//! every active component of its type, split by visibility category, and
//! keeps drawables in an octree so culling queries touch only candidates.

use std::collections::{BTreeMap, HashMap};

use super::drawable::Category;
use super::entity::EntityId;
use super::type_key::TypeKey;
use crate::spatial::{Aabb, Frustum, Octree, OctreeConfig, Sphere};

/// Reference to one component: owning entity plus type key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentRef {
    /// Owning entity
    pub entity: EntityId,
    /// Component type
    pub key: TypeKey,
}

impl ComponentRef {
    /// Create a reference
    pub fn new(entity: EntityId, key: TypeKey) -> Self {
        Self { entity, key }
    }
}

/// Category filter for index queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFilter {
    /// Every member
    All,
    /// Opaque drawables
    Opaque,
    /// Transparent drawables
    Transparent,
}

impl IndexFilter {
    fn accepts(self, category: Option<Category>) -> bool {
        match self {
            Self::All => true,
            Self::Opaque => category == Some(Category::Opaque),
            Self::Transparent => category == Some(Category::Transparent),
        }
    }
}

/// Traversal strategy for index queries
#[derive(Debug, Clone, Copy)]
pub enum SpatialQuery<'a> {
    /// Unfiltered linear scan
    Everything,
    /// Six-plane frustum test against the octree
    Frustum(&'a Frustum),
    /// Bounding-sphere overlap test against the octree
    Sphere(Sphere),
}

/// Index of the active components of one type
#[derive(Debug, Clone)]
pub struct ComponentIndex {
    key: TypeKey,
    members: BTreeMap<EntityId, Option<Category>>,
    octree: Octree<EntityId>,
    /// Drawables centered outside the octree's world bounds
    outside: BTreeMap<EntityId, Sphere>,
}

impl ComponentIndex {
    fn new(key: TypeKey, world: Aabb, config: OctreeConfig) -> Self {
        Self {
            key,
            members: BTreeMap::new(),
            octree: Octree::new(world, config),
            outside: BTreeMap::new(),
        }
    }

    /// Component type of this index
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Member count
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the index has no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether `entity` has an indexed component of this type
    pub fn contains(&self, entity: EntityId) -> bool {
        self.members.contains_key(&entity)
    }

    /// Members accepted by `filter`, in entity order
    pub fn members(&self, filter: IndexFilter) -> Vec<ComponentRef> {
        self.members
            .iter()
            .filter(|(_, category)| filter.accepts(**category))
            .map(|(entity, _)| ComponentRef::new(*entity, self.key))
            .collect()
    }

    /// Opaque drawables
    pub fn opaque(&self) -> Vec<ComponentRef> {
        self.members(IndexFilter::Opaque)
    }

    /// Transparent drawables
    pub fn transparent(&self) -> Vec<ComponentRef> {
        self.members(IndexFilter::Transparent)
    }

    fn insert(&mut self, entity: EntityId, drawable: Option<(Category, Sphere)>) {
        self.remove(entity);
        self.members.insert(entity, drawable.map(|(category, _)| category));
        if let Some((_, sphere)) = drawable {
            self.place(entity, sphere);
        }
    }

    fn place(&mut self, entity: EntityId, sphere: Sphere) {
        if !self.octree.insert(entity, sphere) {
            self.outside.insert(entity, sphere);
        }
    }

    fn remove(&mut self, entity: EntityId) -> bool {
        let Some(category) = self.members.remove(&entity) else {
            return false;
        };
        if category.is_some() && self.outside.remove(&entity).is_none() {
            self.octree.remove(entity);
        }
        true
    }

    fn relocate(&mut self, entity: EntityId, sphere: Sphere) {
        if !matches!(self.members.get(&entity), Some(Some(_))) {
            return;
        }
        if self.outside.remove(&entity).is_none() {
            self.octree.remove(entity);
        }
        self.place(entity, sphere);
    }

    /// Entities whose component passes `filter` and the spatial test.
    ///
    /// Non-drawable members have no bounds and pass every spatial test.
    /// Results are sorted and unique.
    pub fn query(&self, filter: IndexFilter, spatial: SpatialQuery<'_>) -> Vec<EntityId> {
        let mut hits: Vec<EntityId> = match spatial {
            SpatialQuery::Everything => {
                return self
                    .members
                    .iter()
                    .filter(|(_, category)| filter.accepts(**category))
                    .map(|(entity, _)| *entity)
                    .collect();
            }
            SpatialQuery::Frustum(frustum) => self
                .octree
                .query_frustum(frustum)
                .into_iter()
                .map(|item| item.key)
                .chain(
                    self.outside
                        .iter()
                        .filter(|(_, sphere)| frustum.intersects_sphere(sphere))
                        .map(|(entity, _)| *entity),
                )
                .collect(),
            SpatialQuery::Sphere(bounds) => self
                .octree
                .query_sphere(&bounds)
                .into_iter()
                .map(|item| item.key)
                .chain(
                    self.outside
                        .iter()
                        .filter(|(_, sphere)| sphere.intersects(&bounds))
                        .map(|(entity, _)| *entity),
                )
                .collect(),
        };

        hits.extend(
            self.members
                .iter()
                .filter(|(_, category)| category.is_none())
                .map(|(entity, _)| *entity),
        );
        hits.retain(|entity| self.members.get(entity).is_some_and(|c| filter.accepts(*c)));
        hits.sort_unstable();
        hits.dedup();
        hits
    }
}

/// All per-type indices of a scene
#[derive(Debug, Clone)]
pub struct ComponentRegistry {
    indices: HashMap<TypeKey, ComponentIndex>,
    world: Aabb,
    config: OctreeConfig,
}

impl ComponentRegistry {
    /// Create an empty registry whose octrees cover `world`
    pub fn new(world: Aabb, config: OctreeConfig) -> Self {
        Self {
            indices: HashMap::new(),
            world,
            config,
        }
    }

    /// Index of one component type
    pub fn index(&self, key: TypeKey) -> Option<&ComponentIndex> {
        self.indices.get(&key)
    }

    /// Keys with an index
    pub fn keys(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.indices.keys().copied()
    }

    /// Total indexed components across all types
    pub fn total(&self) -> usize {
        self.indices.values().map(ComponentIndex::len).sum()
    }

    /// Add a component
    pub fn insert(&mut self, component: ComponentRef, drawable: Option<(Category, Sphere)>) {
        let (world, config) = (self.world, &self.config);
        self.indices
            .entry(component.key)
            .or_insert_with(|| ComponentIndex::new(component.key, world, config.clone()))
            .insert(component.entity, drawable);
    }

    /// Remove a component; false when it was not indexed
    pub fn remove(&mut self, component: ComponentRef) -> bool {
        self.indices
            .get_mut(&component.key)
            .is_some_and(|index| index.remove(component.entity))
    }

    /// Move a drawable to new world bounds
    pub fn relocate(&mut self, component: ComponentRef, sphere: Sphere) {
        if let Some(index) = self.indices.get_mut(&component.key) {
            index.relocate(component.entity, sphere);
        }
    }

    /// Drop every index
    pub fn clear(&mut self) {
        self.indices.clear();
    }
}

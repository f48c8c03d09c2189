//! Octree spatial partitioning structure
//!
//! Divides 3D space into hierarchical regions for fast culling queries.
//! Each node subdivides into 8 octants when item density exceeds a
//! threshold. Items are bounding spheres keyed by any copyable id.

use serde::{Deserialize, Serialize};

use super::{Aabb, Frustum, Sphere};
use crate::foundation::math::Vec3;

/// Configuration for octree behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctreeConfig {
    /// Maximum items per node before subdivision
    pub max_entities_per_node: usize,

    /// Maximum subdivision depth
    pub max_depth: u32,

    /// Minimum node half-size (prevents excessive subdivision)
    pub min_node_size: f32,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_entities_per_node: 8,
            max_depth: 8,
            min_node_size: 1.0,
        }
    }
}

/// Item stored in the octree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OctreeItem<K> {
    /// Caller key
    pub key: K,
    /// World-space bounding sphere
    pub bounds: Sphere,
}

/// Single node in the octree hierarchy
#[derive(Debug, Clone)]
pub struct OctreeNode<K> {
    /// World-space bounds of this node
    pub bounds: Aabb,

    /// Items stored at this node
    pub items: Vec<OctreeItem<K>>,

    /// Child nodes (8 octants), None if this is a leaf
    pub children: Option<Box<[OctreeNode<K>; 8]>>,

    /// Depth in the tree (0 = root)
    pub depth: u32,
}

impl<K: Copy + PartialEq> OctreeNode<K> {
    /// Create a new leaf node
    pub fn new(bounds: Aabb, depth: u32) -> Self {
        Self {
            bounds,
            items: Vec::new(),
            children: None,
            depth,
        }
    }

    /// Check if this node is a leaf (has no children)
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    fn octant_of(&self, position: Vec3) -> usize {
        let center = self.bounds.center();
        let x_bit = usize::from(position.x >= center.x);
        let y_bit = usize::from(position.y >= center.y);
        let z_bit = usize::from(position.z >= center.z);
        (z_bit << 2) | (y_bit << 1) | x_bit
    }

    fn subdivide(&mut self) {
        if self.children.is_some() {
            return;
        }

        let center = self.bounds.center();
        let quarter = self.bounds.extents() * 0.5;
        let depth = self.depth + 1;

        let children: [OctreeNode<K>; 8] = std::array::from_fn(|octant| {
            let sign = |bit: usize| if octant & bit != 0 { 1.0 } else { -1.0 };
            let child_center = Vec3::new(
                center.x + quarter.x * sign(1),
                center.y + quarter.y * sign(2),
                center.z + quarter.z * sign(4),
            );
            OctreeNode::new(Aabb::from_center_extents(child_center, quarter), depth)
        });
        self.children = Some(Box::new(children));

        for item in std::mem::take(&mut self.items) {
            let octant = self.octant_of(item.bounds.center);
            if let Some(children) = self.children.as_mut() {
                children[octant].items.push(item);
            }
        }
    }

    /// Insert an item; false when its center is outside this node
    pub fn insert(&mut self, item: OctreeItem<K>, config: &OctreeConfig) -> bool {
        if !self.bounds.contains_point(item.bounds.center) {
            return false;
        }

        if self.is_leaf() {
            let should_subdivide = self.items.len() >= config.max_entities_per_node
                && self.depth < config.max_depth
                && self.bounds.extents().x > config.min_node_size;

            if !should_subdivide {
                self.items.push(item);
                return true;
            }
            self.subdivide();
        }

        let octant = self.octant_of(item.bounds.center);
        match self.children.as_mut() {
            Some(children) => children[octant].insert(item, config),
            None => false,
        }
    }

    /// Remove an item by key
    pub fn remove(&mut self, key: K) -> bool {
        if let Some(index) = self.items.iter().position(|i| i.key == key) {
            self.items.swap_remove(index);
            return true;
        }

        if let Some(children) = self.children.as_mut() {
            return children.iter_mut().any(|child| child.remove(key));
        }

        false
    }

    /// Collect items whose sphere intersects the frustum
    pub fn query_frustum(&self, frustum: &Frustum, max_radius: f32, results: &mut Vec<OctreeItem<K>>) {
        // Items may overhang their node by up to their radius
        let reach = Vec3::new(max_radius, max_radius, max_radius);
        let expanded = Aabb::new(self.bounds.min - reach, self.bounds.max + reach);
        if !frustum.intersects_aabb(&expanded) {
            return;
        }

        results.extend(self.items.iter().filter(|i| frustum.intersects_sphere(&i.bounds)));

        if let Some(children) = self.children.as_ref() {
            for child in children.iter() {
                child.query_frustum(frustum, max_radius, results);
            }
        }
    }

    /// Collect items whose sphere intersects the query sphere
    pub fn query_sphere(&self, sphere: &Sphere, max_radius: f32, results: &mut Vec<OctreeItem<K>>) {
        let grown = Sphere::new(sphere.center, sphere.radius + max_radius);
        if !grown.intersects_aabb(&self.bounds) {
            return;
        }

        results.extend(self.items.iter().filter(|i| i.bounds.intersects(sphere)));

        if let Some(children) = self.children.as_ref() {
            for child in children.iter() {
                child.query_sphere(sphere, max_radius, results);
            }
        }
    }

    /// Count items in this node and all children
    pub fn count(&self) -> usize {
        self.items.len()
            + self
                .children
                .as_ref()
                .map_or(0, |children| children.iter().map(OctreeNode::count).sum())
    }
}

/// Octree spatial partitioning structure
#[derive(Debug, Clone)]
pub struct Octree<K> {
    /// Root node containing the entire world space
    pub root: OctreeNode<K>,

    config: OctreeConfig,

    /// Largest radius inserted since the last clear
    max_radius: f32,
}

impl<K: Copy + PartialEq> Octree<K> {
    /// Create a new octree with given world bounds
    pub fn new(world_bounds: Aabb, config: OctreeConfig) -> Self {
        Self {
            root: OctreeNode::new(world_bounds, 0),
            config,
            max_radius: 0.0,
        }
    }

    /// World bounds covered by the tree
    pub fn bounds(&self) -> Aabb {
        self.root.bounds
    }

    /// Insert an item; false when its center lies outside the world bounds
    pub fn insert(&mut self, key: K, bounds: Sphere) -> bool {
        let inserted = self.root.insert(OctreeItem { key, bounds }, &self.config);
        if inserted {
            self.max_radius = self.max_radius.max(bounds.radius);
        }
        inserted
    }

    /// Remove an item
    pub fn remove(&mut self, key: K) -> bool {
        self.root.remove(key)
    }

    /// Query items intersecting a frustum
    pub fn query_frustum(&self, frustum: &Frustum) -> Vec<OctreeItem<K>> {
        let mut results = Vec::new();
        self.root.query_frustum(frustum, self.max_radius, &mut results);
        results
    }

    /// Query items intersecting a sphere
    pub fn query_sphere(&self, sphere: &Sphere) -> Vec<OctreeItem<K>> {
        let mut results = Vec::new();
        self.root.query_sphere(sphere, self.max_radius, &mut results);
        results
    }

    /// Total item count
    pub fn len(&self) -> usize {
        self.root.count()
    }

    /// Whether the tree holds no items
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every item
    pub fn clear(&mut self) {
        self.root = OctreeNode::new(self.root.bounds, 0);
        self.max_radius = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Mat4Ext};

    fn world() -> Aabb {
        Aabb::new(Vec3::new(-100.0, -100.0, -100.0), Vec3::new(100.0, 100.0, 100.0))
    }

    #[test]
    fn test_octree_subdivision() {
        let config = OctreeConfig {
            max_entities_per_node: 4,
            max_depth: 3,
            min_node_size: 1.0,
        };
        let mut octree = Octree::new(world(), config);

        for key in 0..10u32 {
            assert!(octree.insert(key, Sphere::new(Vec3::zeros(), 1.0)));
        }

        assert_eq!(octree.len(), 10);
        assert!(octree.root.children.is_some());
    }

    #[test]
    fn test_octree_rejects_outside_world() {
        let mut octree = Octree::new(world(), OctreeConfig::default());
        assert!(!octree.insert(1u32, Sphere::new(Vec3::new(500.0, 0.0, 0.0), 1.0)));
        assert!(octree.is_empty());
    }

    #[test]
    fn test_octree_sphere_query_and_remove() {
        let mut octree = Octree::new(world(), OctreeConfig::default());
        octree.insert(1u32, Sphere::new(Vec3::zeros(), 1.0));
        octree.insert(2u32, Sphere::new(Vec3::new(5.0, 0.0, 0.0), 1.0));
        octree.insert(3u32, Sphere::new(Vec3::new(50.0, 0.0, 0.0), 1.0));

        let hits = octree.query_sphere(&Sphere::new(Vec3::zeros(), 10.0));
        assert_eq!(hits.len(), 2);

        assert!(octree.remove(2));
        assert!(!octree.remove(2));
        assert_eq!(octree.query_sphere(&Sphere::new(Vec3::zeros(), 10.0)).len(), 1);
    }

    #[test]
    fn test_octree_frustum_query() {
        let mut octree = Octree::new(world(), OctreeConfig { max_entities_per_node: 1, ..OctreeConfig::default() });
        octree.insert(1u32, Sphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0));
        octree.insert(2u32, Sphere::new(Vec3::new(0.0, 0.0, 10.0), 1.0));
        octree.insert(3u32, Sphere::new(Vec3::new(2.0, 1.0, -30.0), 1.0));

        let proj = Mat4::perspective(1.2, 1.0, 0.1, 100.0);
        let frustum = Frustum::from_matrix(&(proj * Mat4::vulkan_coordinate_transform()));
        let mut keys: Vec<u32> = octree.query_frustum(&frustum).iter().map(|i| i.key).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec![1, 3]);
    }
}

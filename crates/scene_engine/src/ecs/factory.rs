//! Component factory
//!
//! Maps a [`TypeKey`] to a constructor so scenes can rebuild components from
//! stored keys. Populated once at startup.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::component::Component;
use super::type_key::{Named, TypeKey};

type Constructor = Arc<dyn Fn() -> Box<dyn Component> + Send + Sync>;

/// Registry of component constructors keyed by type id
#[derive(Default)]
pub struct ComponentFactory {
    constructors: RwLock<HashMap<TypeKey, (&'static str, Constructor)>>,
}

impl ComponentFactory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for `T`; returns false when `T` was already registered
    pub fn register<T, F>(&self, constructor: F) -> bool
    where
        T: Component + Named,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let mut constructors = self.constructors.write();
        if let Some((existing, _)) = constructors.get(&T::KEY) {
            if *existing != T::NAME {
                log::error!("Type key collision between '{existing}' and '{}'", T::NAME);
            }
            return false;
        }

        let constructor: Constructor = Arc::new(move || Box::new(constructor()) as Box<dyn Component>);
        constructors.insert(T::KEY, (T::NAME, constructor));
        log::debug!("Registered component factory '{}'", T::NAME);
        true
    }

    /// Construct a component by key
    pub fn create(&self, key: TypeKey) -> Option<Box<dyn Component>> {
        let constructor = self.constructors.read().get(&key).map(|(_, c)| Arc::clone(c));
        match constructor {
            Some(constructor) => Some(constructor()),
            None => {
                log::warn!("No component factory registered for {key:?}");
                None
            }
        }
    }

    /// Whether a constructor is registered for `key`
    pub fn contains(&self, key: TypeKey) -> bool {
        self.constructors.read().contains_key(&key)
    }

    /// Declared name registered for `key`
    pub fn name_of(&self, key: TypeKey) -> Option<&'static str> {
        self.constructors.read().get(&key).map(|(name, _)| *name)
    }
}

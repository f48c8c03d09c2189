//! Runtime type identity
//!
//! Every component and renderer declares a stable name; the XXH3 hash of
//! that name is its [`TypeKey`]. Keys are computed at compile time and stay
//! identical across builds and platforms.

use std::fmt;

use xxhash_rust::const_xxh3::xxh3_64;

/// Stable 64-bit type identifier derived from a declared name
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeKey(pub u64);

impl TypeKey {
    /// Hash a declared name
    pub const fn of(name: &str) -> Self {
        Self(xxh3_64(name.as_bytes()))
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({:#018x})", self.0)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Types with a declared stable name
pub trait Named {
    /// Declared name
    const NAME: &'static str;

    /// Key derived from [`Named::NAME`]
    const KEY: TypeKey = TypeKey::of(Self::NAME);
}

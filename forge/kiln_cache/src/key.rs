//! Type-erased identity keys.
//!
//! A `UnitKey` represents "what to generate". Equality and hashing are
//! structural, never identity-based: two keys lifted from equal values
//! collide in the cache even when the key objects are distinct.
//! The erasure keeps the cache untyped: recipes with different key
//! types share one scope registry.

// Arc is needed here: keys are cloned into the cache map and the
// assigned-name memo while callers retain their own handle.
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Object-safe view of a key value.
///
/// Implemented automatically for every `Eq + Hash + Debug + Send +
/// Sync + 'static` type; lift values with [`UnitKey::new`] rather than
/// implementing this by hand.
pub trait KeySpec: Any + Send + Sync + fmt::Debug {
    /// Structural equality against another erased key.
    fn eq_key(&self, other: &dyn KeySpec) -> bool;
    /// Structural hash. Includes the concrete type so equal bit
    /// patterns of different types never collide.
    fn hash_key(&self, state: &mut dyn Hasher);
    fn as_any(&self) -> &dyn Any;
}

impl<T> KeySpec for T
where
    T: Eq + Hash + fmt::Debug + Send + Sync + 'static,
{
    fn eq_key(&self, other: &dyn KeySpec) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn hash_key(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<T>().hash(&mut state);
        self.hash(&mut state);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An immutable, structurally-comparable identity key.
///
/// Cheap to clone; owned by the caller and read-only to the cache.
#[derive(Clone)]
pub struct UnitKey(Arc<dyn KeySpec>);

impl UnitKey {
    /// Lift a value into an erased key.
    pub fn new<T>(value: T) -> Self
    where
        T: Eq + Hash + fmt::Debug + Send + Sync + 'static,
    {
        UnitKey(Arc::new(value))
    }

    /// Borrow the underlying value, if it has the given type.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref()
    }
}

impl PartialEq for UnitKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_key(&*other.0)
    }
}

impl Eq for UnitKey {}

impl Hash for UnitKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash_key(state);
    }
}

impl fmt::Debug for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnitKey({:?})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    #[test]
    fn test_structural_equality_across_instances() {
        let a = UnitKey::new(("adder", 2u32));
        let b = UnitKey::new(("adder", 2u32));
        let c = UnitKey::new(("adder", 3u32));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_different_types_never_collide() {
        let int_key = UnitKey::new(1i64);
        let uint_key = UnitKey::new(1u64);
        assert_ne!(int_key, uint_key);
    }

    #[test]
    fn test_usable_as_map_key() {
        let mut map: FxHashMap<UnitKey, u32> = FxHashMap::default();
        map.insert(UnitKey::new("foo".to_string()), 1);
        // A distinct instance with equal content hits the same entry.
        assert_eq!(map.get(&UnitKey::new("foo".to_string())), Some(&1));
        assert_eq!(map.get(&UnitKey::new("bar".to_string())), None);
    }

    #[test]
    fn test_downcast_ref() {
        let key = UnitKey::new(7u32);
        assert_eq!(key.downcast_ref::<u32>(), Some(&7));
        assert_eq!(key.downcast_ref::<i32>(), None);
    }
}

//! Tagged values carried between sampled nodes.

use crate::error::{BoltzmannError, Result};
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Runtime identity of a Rust type, with its name for diagnostics.
///
/// Equality and hashing use the `TypeId` only.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    /// Tag of `T`.
    pub fn of<T: 'static>() -> Self {
        TypeTag {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Rust type name, for error messages.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this tag belongs to `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A value together with the tag of its concrete type.
pub struct Dynamic {
    tag: TypeTag,
    payload: Box<dyn Any>,
}

impl Dynamic {
    /// Wrap `value` with its tag.
    pub fn new<T: 'static>(value: T) -> Self {
        Dynamic {
            tag: TypeTag::of::<T>(),
            payload: Box::new(value),
        }
    }

    /// Tag of the payload.
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Recover the value, failing with `TypeMismatch` if the tags disagree.
    pub fn downcast<T: 'static>(self) -> Result<T> {
        let actual = self.tag.name;
        self.payload
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| BoltzmannError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                actual,
            })
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dynamic({})", self.tag.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_matching_tag() {
        let value = Dynamic::new(42u32);
        assert!(value.tag().is::<u32>());
        assert_eq!(value.downcast::<u32>().unwrap(), 42);
    }

    #[test]
    fn test_downcast_mismatch_reports_both_types() {
        let value = Dynamic::new(true);
        match value.downcast::<u32>() {
            Err(BoltzmannError::TypeMismatch { expected, actual }) => {
                assert_eq!(expected, "u32");
                assert_eq!(actual, "bool");
            }
            other => panic!("expected a type mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_tags_compare_by_identity() {
        assert_eq!(TypeTag::of::<Vec<u8>>(), TypeTag::of::<Vec<u8>>());
        assert_ne!(TypeTag::of::<Vec<u8>>(), TypeTag::of::<Vec<i8>>());
    }
}

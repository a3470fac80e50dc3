//! Sum-of-products descriptions of Rust types.
//!
//! A type implements [`Structure`] by listing its constructors. Each
//! [`Constructor`] names the atoms it contributes to the size, the types of
//! its fields, and a builder that assembles the value once its fields have
//! been sampled.
//!
//! ```rust,ignore
//! enum Tree {
//!     Leaf,
//!     Node(Box<Tree>, Box<Tree>),
//! }
//!
//! impl Structure for Tree {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![
//!             Constructor::new("Leaf", |_| Ok(Tree::Leaf)).atoms(1),
//!             Constructor::new("Node", |f| {
//!                 Ok(Tree::Node(Box::new(f.field()?), Box::new(f.field()?)))
//!             })
//!             .field::<Tree>()
//!             .field::<Tree>(),
//!         ]
//!     }
//! }
//! ```

use crate::dynamic::{Dynamic, TypeTag};
use crate::error::{BoltzmannError, Result};
use crate::random::{PrimitiveKind, PrimitiveValue, RandomSource};
use crate::schema::Extractor;
use crate::system::TypeIndex;

/// A type that can be described as a sum of products.
pub trait Structure: Sized + 'static {
    /// The constructors of this type, in a fixed order.
    fn constructors() -> Vec<Constructor<Self>>;
}

/// Builds a value from its sampled fields.
pub type Builder<T> = fn(&mut Fields<'_>) -> Result<T>;

/// Reference from a constructor to the type of one of its fields.
#[derive(Clone, Copy, Debug)]
pub struct Field {
    tag: TypeTag,
    visit: fn(&mut Extractor) -> TypeIndex,
}

impl Field {
    /// A field of type `U`.
    pub fn of<U: Structure>() -> Self {
        Field {
            tag: TypeTag::of::<U>(),
            visit: Extractor::visit::<U>,
        }
    }

    /// Tag of the field type.
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub(crate) fn visit(&self, extractor: &mut Extractor) -> TypeIndex {
        (self.visit)(extractor)
    }
}

/// One constructor of a [`Structure`].
pub struct Constructor<T> {
    name: &'static str,
    atoms: u32,
    fields: Vec<Field>,
    build: Builder<T>,
}

impl<T: 'static> Constructor<T> {
    /// A constructor with no atoms and no fields yet.
    pub fn new(name: &'static str, build: Builder<T>) -> Self {
        Constructor {
            name,
            atoms: 0,
            fields: Vec::new(),
            build,
        }
    }

    /// Set the number of atoms this constructor contributes to the size.
    pub fn atoms(mut self, atoms: u32) -> Self {
        self.atoms = atoms;
        self
    }

    /// Append a field of type `U`.
    pub fn field<U: Structure>(mut self) -> Self {
        self.fields.push(Field::of::<U>());
        self
    }

    /// Constructor name, as it appears in the system.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Atoms the constructor itself contributes.
    pub fn atom_count(&self) -> u32 {
        self.atoms
    }

    /// Fields in builder order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub(crate) fn into_erased(self) -> ErasedBuilder {
        let build = self.build;
        Box::new(move |fields: &mut Fields<'_>| build(fields).map(Dynamic::new))
    }
}

pub(crate) type ErasedBuilder = Box<dyn Fn(&mut Fields<'_>) -> Result<Dynamic> + Send + Sync>;

/// Cursor over the sampled fields of one constructor.
pub struct Fields<'a> {
    values: std::vec::IntoIter<Dynamic>,
    rng: &'a mut dyn RandomSource,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(values: Vec<Dynamic>, rng: &'a mut dyn RandomSource) -> Self {
        Fields {
            values: values.into_iter(),
            rng,
        }
    }

    /// Take the next field, which must have type `U`.
    pub fn field<U: 'static>(&mut self) -> Result<U> {
        match self.values.next() {
            Some(value) => value.downcast(),
            None => Err(BoltzmannError::TypeMismatch {
                expected: std::any::type_name::<U>(),
                actual: "end of fields",
            }),
        }
    }

    /// Fields not yet taken.
    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    /// Draw a primitive from its default distribution.
    pub fn draw(&mut self, kind: PrimitiveKind) -> PrimitiveValue {
        self.rng.primitive(kind)
    }

    /// The random source, for builders that need extra draws.
    pub fn rng(&mut self) -> &mut dyn RandomSource {
        &mut *self.rng
    }
}

impl PrimitiveValue {
    pub fn as_bool(self) -> bool {
        match self {
            PrimitiveValue::Bool(b) => b,
            PrimitiveValue::Signed(v) => v != 0,
            PrimitiveValue::Unsigned(v) => v != 0,
            PrimitiveValue::Real(v) => v != 0.0,
            PrimitiveValue::Char(c) => c != '\0',
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            PrimitiveValue::Bool(b) => b as i64,
            PrimitiveValue::Signed(v) => v,
            PrimitiveValue::Unsigned(v) => v as i64,
            PrimitiveValue::Real(v) => v as i64,
            PrimitiveValue::Char(c) => c as i64,
        }
    }

    pub fn as_u64(self) -> u64 {
        match self {
            PrimitiveValue::Signed(v) => v.unsigned_abs(),
            PrimitiveValue::Unsigned(v) => v,
            other => other.as_i64().unsigned_abs(),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            PrimitiveValue::Real(v) => v,
            other => other.as_i64() as f64,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            PrimitiveValue::Char(c) => c,
            other => char::from_u32(other.as_u64() as u32).unwrap_or('?'),
        }
    }
}

macro_rules! primitive_structure {
    ($kind:expr, $convert:ident, $($t:ty),*) => {
        $(
            impl Structure for $t {
                fn constructors() -> Vec<Constructor<Self>> {
                    vec![Constructor::new(stringify!($t), |f| Ok(f.draw($kind).$convert() as $t)).atoms(1)]
                }
            }
        )*
    };
}

primitive_structure!(PrimitiveKind::Signed, as_i64, i8, i16, i32, i64, isize);
primitive_structure!(PrimitiveKind::Unsigned, as_u64, u8, u16, u32, u64, usize);
primitive_structure!(PrimitiveKind::Real, as_f64, f32, f64);

impl Structure for bool {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("bool", |f| Ok(f.draw(PrimitiveKind::Bool).as_bool())).atoms(1)]
    }
}

impl Structure for char {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("char", |f| Ok(f.draw(PrimitiveKind::Char).as_char())).atoms(1)]
    }
}

impl Structure for () {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("()", |_| Ok(()))]
    }
}

impl<T: Structure> Structure for Box<T> {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("Box", |f| Ok(Box::new(f.field()?))).field::<T>()]
    }
}

impl<T: Structure> Structure for Option<T> {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![
            Constructor::new("None", |_| Ok(None)),
            Constructor::new("Some", |f| Ok(Some(f.field()?))).field::<T>(),
        ]
    }
}

impl<T: Structure> Structure for Vec<T> {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![
            Constructor::new("Nil", |_| Ok(Vec::new())),
            Constructor::new("Cons", |f| {
                let head: T = f.field()?;
                let mut tail: Vec<T> = f.field()?;
                // Cells are built innermost first, so the vector comes out reversed.
                tail.push(head);
                Ok(tail)
            })
            .field::<T>()
            .field::<Vec<T>>(),
        ]
    }
}

impl<A: Structure, B: Structure> Structure for (A, B) {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("(,)", |f| Ok((f.field()?, f.field()?)))
            .field::<A>()
            .field::<B>()]
    }
}

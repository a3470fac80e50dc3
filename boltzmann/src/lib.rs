//! Boltzmann samplers for recursive data.
//!
//! This is the main entry point for the library. Describe a type by
//! implementing [`Structure`], then draw values of controlled size from a
//! [`Generator`]:
//!
//! ```rust
//! use boltzmann::*;
//!
//! #[derive(Debug)]
//! enum Tree {
//!     Leaf,
//!     Node(Box<Tree>, Box<Tree>),
//! }
//!
//! impl Structure for Tree {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![
//!             Constructor::new("Leaf", |_| Ok(Tree::Leaf)).atoms(1),
//!             Constructor::new("Node", |f| Ok(Tree::Node(f.field()?, f.field()?)))
//!                 .field::<Box<Tree>>()
//!                 .field::<Box<Tree>>(),
//!         ]
//!     }
//! }
//!
//! let generator = Generator::<Tree>::ceiled();
//! let mut rng = SeedSource::from_u64(42);
//! let tree = generator.sample_singular_rejection(Size(100), &mut rng).unwrap();
//! assert!((90..=110).contains(&tree.size.get()));
//! ```

pub use boltzmann_core::*;

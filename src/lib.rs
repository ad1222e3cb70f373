//! Fixed-capacity hierarchy arena.
//!
//! A [`Fern`] owns a table of fronds addressed by [`FrondId`]. Two slots are
//! reserved: [`FrondId::INVALID`] (no node, and head of the free pool) and
//! [`FrondId::ROOT`] (top of the forest). Every other slot is either in the
//! free pool or attached to exactly one parent's child chain. Allocation and
//! release relink slots; the table never grows after construction.
//!
//! ```
//! use fern::{Fern, FrondId};
//!
//! let mut fern = Fern::new(4)?;
//! let child = fern.allocate(FrondId::ROOT, "child")?;
//! let grandchild = fern.allocate(child, "grandchild")?;
//! assert!(fern.is_descendant(FrondId::ROOT, grandchild)?);
//! assert_eq!(fern.free_count(), 2);
//! # Ok::<(), fern::FernError>(())
//! ```

pub mod arena;
mod chain;
pub mod config;
pub mod errors;
pub mod id;
mod invariants;
pub mod tree_traits;
pub mod util;

pub use arena::{Ancestors, Descendants, Fern};
pub use chain::Siblings;
pub use config::Settings;
pub use errors::{FernError, FernResult};
pub use id::FrondId;
pub use tree_traits::TreeNodeConvert;

//! Generation-checked storage.
//!
//! Backends keep every native object in a `GenSlab` and give the client a `SlabKey`. The key holds
//! the slot index plus the generation of the value that was stored there, so a key that outlived
//! its value (destroyed, or destroyed and the slot reused) resolves to nothing instead of to a
//! different object.
//!
//! Most operations are O(1), but inserting can resize the backing vector.

/// Scalar type for tracking element generation
///
/// u32 should be enough, even at 120fps, one allocation per frame, it would take
/// more than a year to exhaust
pub type GenerationCounterT = u32;

/// Scalar type for the count of elements in a slab
pub type SlabIndexT = u32;

mod gen_slab;
mod generation;

pub use generation::Generation;
pub use generation::GenerationIndex;

pub use gen_slab::GenSlab;
pub use gen_slab::SlabKey;

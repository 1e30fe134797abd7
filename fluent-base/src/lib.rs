//! Lowest level crate of `fluent`. Holds the generational storage that every backend uses to hand out
//! opaque resource handles.

pub mod slab;

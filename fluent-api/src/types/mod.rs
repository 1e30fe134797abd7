//! Backend-neutral types: enums, creation infos and the per-command parameter structs.

mod misc;
pub use misc::*;

mod format;
pub use format::*;

mod definitions;
pub use definitions::*;

mod commands;
pub use commands::*;

mod handles;
pub use handles::*;

mod wsi;
pub use wsi::*;

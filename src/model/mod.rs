//! Core data model — identities, paths, content, items, change records.

pub mod blob;
pub mod change;
pub mod ident;
pub mod item;
pub mod path;

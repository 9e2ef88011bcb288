//! Domain types: opaque server records, task outcomes and typed parameters.

pub mod entities;
pub mod value_objects;

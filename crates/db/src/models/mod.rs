//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` entity matching the table, plus
//! `Deserialize` create/update DTOs where the entity is writable over HTTP.

pub mod category;
pub mod operation;
pub mod product;
pub mod user;

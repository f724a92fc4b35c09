//! Domain logic for the catalog service.
//!
//! Everything in this crate is free of database and HTTP dependencies so it
//! can be unit tested in isolation and shared by the persistence, job, and API
//! layers.

pub mod error;
pub mod import;
pub mod listing;
pub mod operation;
pub mod pagination;
pub mod report;
pub mod types;
pub mod validation;

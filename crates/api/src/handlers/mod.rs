//! Request handlers, one submodule per resource.
//!
//! Handlers delegate to the repositories in `catalog_db` or to the job
//! services in `catalog_jobs` and map errors via [`crate::error::AppError`].

pub mod auth;
pub mod category;
pub mod operation;
pub mod product;
pub mod report;
pub mod user;

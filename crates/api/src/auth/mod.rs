//! Authentication primitives.
//!
//! - [`password`] -- Argon2id password hashing and strength rules.
//! - [`jwt`] -- access-token generation and validation.

pub mod jwt;
pub mod password;

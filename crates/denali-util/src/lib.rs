#![forbid(unsafe_code)]
//! Hashing and filesystem utilities shared by the Denali build crates.

pub mod error;
pub mod fs;
pub mod hash;

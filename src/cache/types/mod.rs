//! Shared cache value types

pub mod statistics;

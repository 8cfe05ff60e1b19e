//! Perfdelta - performance regression detection between profile versions
//!
//! This library fits regression models to performance profiles, finds the
//! nearest comparable baseline profile in a version history and classifies
//! the differences with configurable degradation methods.

pub mod check;
pub mod cli;
pub mod fitting;
pub mod pairing;
pub mod profile;
pub mod store;

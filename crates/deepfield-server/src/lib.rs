//! Deepfield Server - SpacetimeDB Module
//!
//! Hosts the anomaly catalog, community interactions, and deployment linkage
//! tables. Every deploy runs as one reducer transaction over
//! `deepfield-logic`; clients resolve sectors locally with the same crate.

mod reducers;
mod store;
mod tables;

pub use reducers::*;
pub use tables::*;

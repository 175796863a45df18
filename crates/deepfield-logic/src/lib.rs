//! Pure deployment logic for Deepfield.
//!
//! Users browse an unbounded grid of sky sectors, pick one, and deploy an
//! automaton (telescope or weather satellite) that links a small, seeded
//! selection of catalogued anomalies to them. Nothing here touches a
//! database: storage is reached through the traits in [`store`], implemented
//! by the SpacetimeDB module, by [`memory::MemoryStore`] in tests, and by the
//! simtest harness.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`allocation`] | Balanced seeded target selection across category pools |
//! | [`catalog`] | Anomaly records, category tag table, deployment types, unlocks |
//! | [`config`] | Tunable deployment parameters and the hard target cap |
//! | [`error`] | Deployment error taxonomy |
//! | [`memory`] | In-memory implementation of every collaborator trait |
//! | [`outbox`] | Post-commit notification queue and best-effort dispatch |
//! | [`pipeline`] | The full deploy action: unlocks, quota, allocation, commit |
//! | [`quota`] | Weekly deploy quota with earned community credit |
//! | [`recorder`] | Guarded, idempotent linkage writes with partial-commit reports |
//! | [`satellite`] | Planet focus and cloud targets for weather satellites |
//! | [`sector`] | Sector names, star fields, and per-sector candidates |
//! | [`seeded`] | Deterministic sine-hash generator and seed schemes |
//! | [`session`] | Per-user deploy session state machine |
//! | [`store`] | Collaborator traits and store errors |
//! | [`time`] | Microsecond timestamps and rolling windows |

pub mod allocation;
pub mod catalog;
pub mod config;
pub mod error;
pub mod memory;
pub mod outbox;
pub mod pipeline;
pub mod quota;
pub mod recorder;
pub mod satellite;
pub mod sector;
pub mod seeded;
pub mod session;
pub mod store;
pub mod time;

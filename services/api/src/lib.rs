//! Cadence API Library Crate
//!
//! This library contains the service-side logic for the Cadence music tutor:
//! configuration, the in-memory session store, REST handlers, WebSocket
//! streaming, routing, and the speech backend used by the terminal tutor. The
//! binaries under `bin/` are thin wrappers around it.

pub mod audio_utils;
pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod startup;
pub mod state;
pub mod tutor;
pub mod voice;
pub mod ws;

//! Dyelab: batch garment recoloring.
//!
//! Turns a set of garment photos and target colors into recolored variants
//! through an external generative image service, one request at a time with
//! retry and pacing. Also picks exact pixel colors from reference images.
//! This library exposes modules for integration testing.

pub mod api;
pub mod error;
pub mod models;
pub mod server;
pub mod services;

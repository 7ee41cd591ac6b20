#![forbid(unsafe_code)]

//! Shared building blocks for the TubeProg binaries: configuration, the
//! program library, the YouTube client and the channel sync reconciler.

pub mod config;
pub mod duration;
pub mod feed;
pub mod library;
pub mod logging;
pub mod models;
pub mod reconcile;
pub mod schedule;
pub mod youtube;

//! Repository functions, one module per table family.
//!
//! Control-plane: [`configs`], [`screenings`], [`whitelist`], [`datasets`],
//! [`data_model`], [`cases`]. Per-organization: [`ingested`], [`monitored`],
//! [`delta_tracks`].

pub mod cases;
pub mod configs;
pub mod data_model;
pub mod datasets;
pub mod delta_tracks;
pub mod ingested;
pub mod monitored;
pub mod screenings;
pub mod whitelist;

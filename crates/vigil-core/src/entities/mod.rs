//! Entity structs for all Vigil domain objects.
//!
//! Control-plane entities (configs, screenings, matches, whitelists, dataset
//! files) and per-organization entities (monitored objects, delta tracks,
//! ingested objects) share this module; where they are stored is the concern
//! of `vigil-db`.

mod case;
mod config;
mod data_model;
mod dataset;
mod delta;
mod ingested;
mod monitoring;
mod screening;
mod whitelist;

pub use case::{Case, NewCase, NewCaseEvent};
pub use config::{NewScreeningConfig, ScreeningConfig, ScreeningConfigUpdate};
pub use data_model::{DataModel, Field, Table};
pub use dataset::{DatasetCursor, DatasetFile, DatasetUpdate, DatasetUpdateJob};
pub use delta::DeltaTrack;
pub use ingested::IngestedObject;
pub use monitoring::MonitoredObject;
pub use screening::{ContinuousScreening, ContinuousScreeningWithMatches, ScreeningMatch};
pub use whitelist::ScreeningWhitelist;

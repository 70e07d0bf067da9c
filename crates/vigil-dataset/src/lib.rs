//! # vigil-dataset
//!
//! Follow-The-Money dataset export and watchlist delta handling.
//!
//! - [`builder::DatasetBuilder`] writes an organization's monitored objects
//!   as a full snapshot, then as `ADD`/`MOD`/`DEL` deltas.
//! - [`catalog::ExportedCatalog`] describes those files to the indexer.
//! - [`decoder::DeltaFileDecoder`] reads watchlist delta files and can resume
//!   at a saved byte offset.
//! - [`blob::BlobStore`] wraps `object_store` for all of the above.

pub mod blob;
pub mod builder;
pub mod catalog;
mod countries;
pub mod decoder;
pub mod entity;
pub mod error;
pub mod normalize;
pub mod paths;
pub mod version;

pub use blob::{BlobStore, BlobStream};
pub use builder::DatasetBuilder;
pub use catalog::{CatalogDocument, CatalogEntry, DeltaVersions, ExportedCatalog};
pub use decoder::DeltaFileDecoder;
pub use entity::{DeltaOp, DeltaRecord, EntityNotes, FtmEntity};
pub use error::DatasetError;
pub use version::generate_next_version;

//! # Memoria Archivist
//!
//! The archival stage of the Memoria Residua pipeline. It takes a labeled
//! code snippet, gives it the next fragment number, writes it into the
//! archive with a provenance header, records it in the metadata index and
//! commits it to version history.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐   ┌──────────┐   ┌─────────────────────────────────────────────┐
//! │ Search │──▶│ Labeling │──▶│ Archivist                                   │
//! └────────┘   └──────────┘   │  allocate → write → index → stage & commit  │
//!                             └──────┬──────────┬─────────┬──────────┬──────┘
//!                                    ▼          ▼         ▼          ▼
//!                              counter.json  fragment  index.log    git
//!                                             files    index.json
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! scout | analyst | archivist store     # archive one fragment
//! archivist next-id                     # peek at the next number
//! archivist status                      # files vs index health
//! archivist export --format js --output docs/js/data.js
//! ```
//!
//! ## Single writer
//!
//! The archive has no multi-writer protection beyond the id counter's
//! compare-and-swap. Run one `archivist store` at a time per archive.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`envelope`] | Input envelope parsing and validation |
//! | [`layout`] | On-disk archive layout |
//! | [`allocator`] | Fragment id allocation |
//! | [`index_store`] | Metadata index persistence |
//! | [`writer`] | Fragment file rendering |
//! | [`commit_message`] | Commit message and tag inference |
//! | [`traits`] | Collaborator seams (search, labeling, repository) |
//! | [`repository`] | Git repository client |
//! | [`archivist`] | Archival orchestration |
//! | [`pipeline`] | Search → labeling → archival composition |
//! | [`status`] | Archive health report |
//! | [`export`] | Gallery data export |

pub mod allocator;
pub mod archivist;
pub mod commit_message;
pub mod config;
pub mod envelope;
pub mod error;
pub mod export;
pub mod index_store;
pub mod layout;
pub mod models;
pub mod pipeline;
pub mod repository;
pub mod status;
pub mod traits;
pub mod writer;

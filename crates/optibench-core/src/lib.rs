//! # Optibench Core
//!
//! The model and solve machinery of the Optibench optical bench: an ordered
//! sequence of optical elements along one axis, and a pipeline that
//! propagates a scalar field through it and writes what the screens see.
//!
//! ## Architecture
//!
//! Every renderer implements the [`engine::Engine`] trait. The
//! [`pipeline::SolvePipeline`] expands screen ranges, orders the elements for
//! simulation, runs the engine and writes images, animations and a metadata
//! document. [`solve::SolveRunner`] runs solves off the editing thread, one
//! at a time per workspace.
//!
//! ## Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`element`] | Element kinds, per-kind parameters, JSON records |
//! | [`sequence`] | Ordered element sequence with the source sentinel |
//! | [`naming`] | Name validation, default names, slugs |
//! | [`range`] | Screen range sampling |
//! | [`workspace`] | Workspace model and JSON persistence |
//! | [`config`] | Preferences (TOML / serde) |
//! | [`assets`] | Bitmap loading for apertures and targets |
//! | [`engine`] | Forward, reverse (phase retrieval) and bitmap engines |
//! | [`pipeline`] | Solve stages, failure taxonomy, metadata |
//! | [`artifacts`] | Output directory and atomic file writes |
//! | [`solve`] | Single-flight background runner |

pub mod artifacts;
pub mod assets;
pub mod config;
pub mod element;
pub mod engine;
pub mod naming;
pub mod pipeline;
pub mod range;
pub mod sequence;
pub mod solve;
pub mod workspace;

pub use config::Preferences;
pub use element::{ElementKind, ElementRecord};
pub use engine::{create_engine, Engine, Frame};
pub use pipeline::{SolveFailure, SolveInput, SolvePipeline, SolveReport};
pub use sequence::{ElementId, ElementSequence, SequenceError};
pub use workspace::{SystemParams, Workspace};

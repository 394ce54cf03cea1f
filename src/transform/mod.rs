//! The class transformation driver.
//!
//! Applies reconstruction and deconstruction across a set of classes until
//! nothing changes. Runs are single-threaded and deterministic: classes are
//! visited in name order, fields in name order, instructions in program
//! order.
//!
//! # Key Components
//!
//! - [`Transformer`] - entry point, node-level and byte-level
//! - [`TransformConfig`] - caller configuration
//! - [`TransformedClass`] / [`TransformedField`] - per-class run state
//! - [`TransformOutput`] - outputs, events and statistics

mod class;
mod config;
mod driver;
mod normalize;

pub use class::{TransformedClass, TransformedField};
pub use config::TransformConfig;
pub use driver::{TransformOutput, Transformer};
pub use normalize::{denormalize, normalize};

//! The host runtime model.
//!
//! Reconstruction needs the real behaviour of library code (what does
//! `Integer.parseInt("42")` return, which enum constant is `Color.RED`) without
//! running the program being transformed. This module defines what the engine
//! may ask of the outside world:
//!
//! - [`Value`] - the values reconstruction produces and deconstruction consumes
//! - [`ClassLoader`], [`HostClass`], [`HostObject`] - classes and objects the
//!   inliner can query but not inspect
//! - [`InputClasses`] - facts about the input classes themselves
//! - [`format`] - Java's string conversions

pub mod format;
mod host;
mod inputs;
mod value;

pub use host::{ClassLoader, HostClass, MapClassLoader, SimpleClass};
pub use inputs::{constant_value, InputClasses};
pub use value::{ArrayValue, EnumConstant, HostObject, Value};

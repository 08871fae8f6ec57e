//! Canopy Core Types and Definitions
//!
//! This crate provides the in-memory element graph for Canopy diagrams. It
//! includes:
//!
//! - **Identifiers**: Efficient string-interned identifiers ([`identifier::Id`])
//! - **Geometry**: Basic geometric types ([`geometry`] module)
//! - **Elements**: Root, shape, connection and label variants ([`element`] module)
//! - **Registry**: The id to element index ([`registry::ElementRegistry`])
//! - **Canvas**: Containment tree and relationship wiring ([`canvas::Canvas`])
//! - **Semantic**: The business-object payload elements visualize ([`semantic`] module)
//! - **Events**: Lifecycle notifications for observers ([`event`] module)

pub mod canvas;
pub mod element;
pub mod error;
pub mod event;
pub mod geometry;
pub mod identifier;
pub mod registry;
pub mod semantic;

pub use error::CanvasError;

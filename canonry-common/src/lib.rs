//! # Canonry Common Library
//!
//! Curation core shared by the Canonry services:
//! - Domain model (works, tiers, lineage edges, promotion events)
//! - Work Store contract with in-memory and SQLite implementations
//! - Edge Registry, Lineage Graph Builder and Promotion Engine
//! - Work catalog (create, look up, list, delete)
//! - Curation events and the event bus
//! - Configuration loading

pub mod catalog;
pub mod config;
pub mod db;
pub mod edges;
pub mod error;
pub mod events;
pub mod lineage;
pub mod model;
pub mod promotion;
pub mod store;

pub use error::{Error, Result};

//! Search provider implementations.
//!
//! Each module provides a struct implementing [`crate::engine::SearchProvider`].

pub mod publicwww;

pub use publicwww::PublicWwwEngine;

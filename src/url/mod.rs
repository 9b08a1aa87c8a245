//! URL handling module for Wiki-Harvest
//!
//! This module provides URL normalization, wiki title validation and
//! allow-listed host matching.

mod matcher;
mod normalize;
mod title;

// Re-export main functions
pub use matcher::{host_allowed, matches_wildcard};
pub use normalize::normalize_url;
pub use title::{is_valid_title, title_to_path};

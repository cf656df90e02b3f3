//! Evidence catalog and citation resolver
//!
//! Normalizes and indexes every citable evidence string of a run and
//! resolves the citations judges claim against it.
//!
//! # Example
//!
//! ```rust
//! use court_catalog::{fallback_citation, has_valid_citation, resolve, EvidenceCatalog};
//!
//! let mut catalog = EvidenceCatalog::new();
//! catalog.insert("stategraph_detected: true");
//!
//! let claims = ["StateGraph Detected"];
//! assert!(has_valid_citation(&claims, &catalog));
//! assert_eq!(
//!     resolve(&claims, &catalog, &fallback_citation("github_repo")),
//!     vec!["stategraph_detected: true".to_string()]
//! );
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod catalog;
mod normalize;
mod resolver;

pub use catalog::{EvidenceCatalog, MAX_FACTS_PER_RECORD};
pub use normalize::{fold, normalize, MAX_ENTRY_CHARS};
pub use resolver::{
    fallback_citation, has_valid_citation, is_fallback_marker, resolve, NO_EVIDENCE_MARKER,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

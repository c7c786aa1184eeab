//! # Cluster Log Testkit
//!
//! Testing utilities for the cluster log.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known summaries with their expected encodings, per feature set
//! - **Generators**: Proptest strategies for entries and admission scripts
//! - **Fixtures**: Simulated nodes emitting entries with increasing seqs and stamps
//!
//! ## Golden Vectors
//!
//! Golden vectors pin the wire format so that old and new peers keep agreeing:
//!
//! ```rust
//! use clog_testkit::vectors::verify_all_vectors;
//!
//! for report in verify_all_vectors() {
//!     assert!(report.matches, "{}: got {}", report.name, report.actual_hex);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use clog_testkit::generators::AdmissionScript;
//!
//! proptest! {
//!     #[test]
//!     fn prune_respects_cap(script: AdmissionScript) {
//!         let mut summary = script.replay();
//!         summary.prune(script.max_per_channel);
//!         for (_, tail) in summary.channels() {
//!             prop_assert!(tail.len() <= script.max_per_channel);
//!         }
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use clog_testkit::fixtures::NodeFixture;
//!
//! let mut osd = NodeFixture::osd(3);
//! let first = osd.info("boot");
//! let second = osd.warn("slow request");
//! assert!(second.seq > first.seq);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{cluster_fixtures, NodeFixture};

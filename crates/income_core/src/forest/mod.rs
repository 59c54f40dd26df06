//! Random forest classifier format and inference
//!
//! - Flat node arrays, root at index 0, `feature <= threshold` goes left
//! - Leaves store class probabilities as fixed-point integers (`SCALE = 1e6`)
//! - Forest probabilities are the integer mean of the leaf distributions
//! - Canonical JSON serialization and BLAKE3 structure hashing
//!
//! # Usage
//!
//! ```rust
//! use income_core::forest::{Forest, Node, Tree, SCALE};
//!
//! let tree = Tree::new(vec![
//!     Node::internal(0, 0, 30, 1, 2),
//!     Node::leaf(1, vec![SCALE, 0]),
//!     Node::leaf(2, vec![0, SCALE]),
//! ]);
//! let forest = Forest::new(
//!     vec!["<=50K".into(), ">50K".into()],
//!     vec!["age".into()],
//!     vec![tree],
//! );
//!
//! let score = forest.predict(&[45]);
//! assert_eq!(score.class_index, 1);
//! assert_eq!(score.confidence(), 1.0);
//! ```

pub mod model;
pub mod tree;

pub use model::{ClassScore, Forest, ForestMetadata, FORMAT_VERSION, SCALE};
pub use tree::{Node, Tree};

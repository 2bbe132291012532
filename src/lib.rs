//! Piecework - a piece table backed by a balanced fixed-fanout tree.
//!
//! A piece table represents a large, frequently edited virtual buffer as a
//! small sequence of `(kind, offset, length)` references into two external
//! append-only byte stores, instead of moving bytes on every edit. This
//! crate maintains that sequence in a B+-style tree, giving O(log n) insert
//! and delete and a linear piece scan, over buffers that may be gigabytes
//! large. The bytes themselves never pass through the table.
//!
//! # Quick Start
//!
//! ```
//! use piecework::{PieceTable, PieceKind};
//!
//! // The caller owns the byte stores; the table only tracks references.
//! let mut table = PieceTable::new();
//!
//! // Load 1 KiB of original content, then splice an edit into the middle.
//! table.insert(0, PieceKind::Original, 0, 1024)?;
//! table.insert(512, PieceKind::Edit, 0, 64)?;
//!
//! assert_eq!(table.len(), 1088);
//! assert_eq!(table.pieces().count(), 3);
//! # Ok::<(), piecework::TableError>(())
//! ```

mod piece;
mod slot_array;
mod slot_queue;
mod table;
mod tree;

pub use piece::{Piece, PieceKind};
pub use table::{MAX_LENGTH, PieceTable, TableError};
pub use tree::Pieces;

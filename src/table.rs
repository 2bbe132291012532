//! The user-facing piece table.
//!
//! A `PieceTable` stands in for a large virtual buffer: the caller keeps the
//! actual bytes in two external append-only stores (the original content and
//! an edit buffer), and the table tracks which runs of which store appear
//! where. Rendering the buffer is a matter of walking [`pieces`] in order
//! and reading each run from the store its kind selects.
//!
//! [`pieces`]: PieceTable::pieces

use thiserror::Error;

use crate::piece::{Piece, PieceKind};
use crate::tree::{PieceTree, Pieces};

/// Maximum total virtual length, and maximum piece offset. Half the `u64`
/// range: one bit stays reserved, mirroring the kind discriminant packed
/// alongside a 63-bit offset in the original on-disk-editor layout. Keeping
/// offsets under this cap also means `offset + length` can never wrap.
pub const MAX_LENGTH: u64 = u64::MAX >> 1;

/// A precondition violation. The table is untouched when one of these comes
/// back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum TableError {
    /// A position past the end of the virtual buffer.
    #[error("position {position} is out of bounds for a table of length {length}")]
    PositionOutOfBounds { position: u64, length: u64 },

    /// A source range extending past the end of the virtual buffer.
    #[error("range of {length} bytes at {position} exceeds table length {table_length}")]
    RangeOutOfBounds {
        position: u64,
        length: u64,
        table_length: u64,
    },

    /// A piece offset past the representable maximum.
    #[error("offset {offset} exceeds the maximum of {MAX_LENGTH}")]
    OffsetOverflow { offset: u64 },

    /// An insert that would push the total past the representable maximum.
    #[error("inserting {length} bytes would exceed the maximum table length")]
    LengthOverflow { length: u64 },
}

/// An editable, position-indexed sequence of pieces.
#[derive(Clone, Debug)]
pub struct PieceTable {
    tree: PieceTree,
    length: u64,
}

impl PieceTable {
    /// An empty table: a root branch over a single empty leaf, length zero.
    pub fn new() -> PieceTable {
        return PieceTable {
            tree: PieceTree::new(),
            length: 0,
        };
    }

    /// Total virtual length, O(1).
    #[inline(always)]
    pub fn len(&self) -> u64 {
        return self.length;
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        return self.length == 0;
    }

    /// Splice a run of `length` bytes at `offset` in the `kind` buffer into
    /// the virtual buffer at `position`.
    ///
    /// A zero-length insert is a no-op. When the run lines up with an
    /// adjacent piece of the same kind it chains onto that piece instead of
    /// adding an entry; on an exact boundary, extending the preceding
    /// piece's tail wins over the following piece's head.
    pub fn insert(
        &mut self,
        position: u64,
        kind: PieceKind,
        offset: u64,
        length: u64,
    ) -> Result<(), TableError> {
        if position > self.length {
            return Err(TableError::PositionOutOfBounds { position, length: self.length });
        }
        if offset > MAX_LENGTH {
            return Err(TableError::OffsetOverflow { offset });
        }
        if length > MAX_LENGTH - self.length {
            return Err(TableError::LengthOverflow { length });
        }
        if length == 0 {
            return Ok(());
        }

        self.tree.insert(position, Piece::new(kind, offset, length));
        self.length += length;
        return Ok(());
    }

    /// Remove `length` bytes of the virtual buffer starting at `position`.
    ///
    /// The source buffers are untouched; pieces shrink, split, or disappear.
    /// A zero-length delete is a no-op.
    pub fn delete(&mut self, position: u64, length: u64) -> Result<(), TableError> {
        if length > self.length || position > self.length - length {
            return Err(TableError::RangeOutOfBounds {
                position,
                length,
                table_length: self.length,
            });
        }
        if length == 0 {
            return Ok(());
        }

        self.tree.delete(position, length);
        self.length -= length;
        return Ok(());
    }

    /// Re-insert the `length` bytes of virtual content starting at `from`
    /// at position `to`.
    ///
    /// The source range is snapshotted before anything moves, so `to` may
    /// sit inside `[from, from + length)`. No bytes are duplicated in the
    /// source buffers; only piece references are.
    pub fn copy(&mut self, from: u64, to: u64, length: u64) -> Result<(), TableError> {
        if length > self.length || from > self.length - length {
            return Err(TableError::RangeOutOfBounds {
                position: from,
                length,
                table_length: self.length,
            });
        }
        if to > self.length {
            return Err(TableError::PositionOutOfBounds { position: to, length: self.length });
        }
        if length > MAX_LENGTH - self.length {
            return Err(TableError::LengthOverflow { length });
        }
        if length == 0 {
            return Ok(());
        }

        let runs = self.tree.collect_range(from, length);
        let mut at = to;
        for piece in runs {
            self.tree.insert(at, piece);
            at += piece.length;
            self.length += piece.length;
        }
        return Ok(());
    }

    /// Iterate every piece in virtual order.
    ///
    /// Concatenating, for each piece, `length` bytes read at `offset` from
    /// the buffer its `kind` selects reproduces the virtual content.
    pub fn pieces(&self) -> Pieces<'_> {
        return self.tree.pieces();
    }

    /// Diagnostic structural check: recorded subtree lengths, parent
    /// back-links, the leaf sibling chain, per-entry positive lengths, and
    /// the cached total. Panics on violation.
    pub fn validate(&self) {
        self.tree.validate();
        assert_eq!(
            self.length,
            self.tree.total_length(),
            "cached length out of sync with the tree",
        );
    }
}

impl Default for PieceTable {
    fn default() -> PieceTable {
        return PieceTable::new();
    }
}

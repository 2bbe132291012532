//! Piece values: references into the external source buffers.
//!
//! A piece names a contiguous run of bytes in one of two append-only buffers
//! the caller owns: the original (unedited) content, or the edit buffer that
//! accumulates inserted text. The table never reads those bytes; it only
//! shuffles these `(kind, offset, length)` triples around.

/// Which external source buffer a piece references.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PieceKind {
    /// The original, unedited content buffer.
    #[default]
    Original,
    /// The append-only buffer of user-inserted text.
    Edit,
}

/// A contiguous run of `length` bytes starting at `offset` in the buffer
/// selected by `kind`.
///
/// Pieces are plain values; a leaf owns each one it stores. Length is always
/// positive for a piece held by the tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Piece {
    pub kind: PieceKind,
    pub offset: u64,
    pub length: u64,
}

impl Piece {
    pub fn new(kind: PieceKind, offset: u64, length: u64) -> Piece {
        return Piece { kind, offset, length };
    }

    /// One past the last source-buffer offset this piece covers.
    #[inline(always)]
    pub(crate) fn end_offset(&self) -> u64 {
        return self.offset + self.length;
    }

    /// Absorb `new` in front of this piece if it is the same kind and its
    /// source run ends exactly where this one begins. Returns whether the
    /// merge happened.
    #[inline]
    pub(crate) fn chain_head(&mut self, new: &Piece) -> bool {
        if self.kind == new.kind && new.end_offset() == self.offset {
            self.offset = new.offset;
            self.length += new.length;
            return true;
        }
        return false;
    }

    /// Absorb `new` behind this piece if it is the same kind and its source
    /// run begins exactly where this one ends. Returns whether the merge
    /// happened.
    #[inline]
    pub(crate) fn chain_tail(&mut self, new: &Piece) -> bool {
        if self.kind == new.kind && self.end_offset() == new.offset {
            self.length += new.length;
            return true;
        }
        return false;
    }
}

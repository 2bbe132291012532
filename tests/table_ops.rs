//! Integration tests driving the table through mixed edit sequences and
//! checking it against a flat per-byte provenance model.

use piecework::{PieceKind, PieceTable};

/// Expand the piece sequence into one `(kind, source offset)` record per
/// virtual byte. Slow and only for tests, but it makes every structural
/// difference observable.
fn expand(table: &PieceTable) -> Vec<(PieceKind, u64)> {
    let mut bytes = Vec::new();
    for piece in table.pieces() {
        assert!(piece.length > 0, "table yielded a zero-length piece");
        for i in 0..piece.length {
            bytes.push((piece.kind, piece.offset + i));
        }
    }
    return bytes;
}

fn model_insert(model: &mut Vec<(PieceKind, u64)>, position: u64, kind: PieceKind, offset: u64, length: u64) {
    let run: Vec<(PieceKind, u64)> = (0..length).map(|i| (kind, offset + i)).collect();
    model.splice(position as usize..position as usize, run);
}

#[test]
fn inserts_match_the_byte_model() {
    let mut table = PieceTable::new();
    let mut model = Vec::new();

    let edits: &[(u64, PieceKind, u64, u64)] = &[
        (0, PieceKind::Original, 0, 300),
        (150, PieceKind::Edit, 0, 40),
        (0, PieceKind::Edit, 40, 10),
        (350, PieceKind::Edit, 50, 25),
        (200, PieceKind::Original, 300, 60),
        (17, PieceKind::Edit, 75, 3),
    ];

    for &(position, kind, offset, length) in edits {
        table.insert(position, kind, offset, length).unwrap();
        model_insert(&mut model, position, kind, offset, length);
        table.validate();
        assert_eq!(expand(&table), model);
    }

    assert_eq!(table.len(), model.len() as u64);
}

#[test]
fn deletes_match_the_byte_model() {
    let mut table = PieceTable::new();
    let mut model = Vec::new();

    table.insert(0, PieceKind::Original, 0, 500).unwrap();
    model_insert(&mut model, 0, PieceKind::Original, 0, 500);
    table.insert(250, PieceKind::Edit, 0, 100).unwrap();
    model_insert(&mut model, 250, PieceKind::Edit, 0, 100);

    let cuts: &[(u64, u64)] = &[(0, 10), (580, 10), (100, 200), (0, 50), (75, 75)];
    for &(position, length) in cuts {
        table.delete(position, length).unwrap();
        model.drain(position as usize..(position + length) as usize);
        table.validate();
        assert_eq!(expand(&table), model);
    }

    assert_eq!(table.len(), model.len() as u64);
}

#[test]
fn copies_match_the_byte_model() {
    let mut table = PieceTable::new();
    let mut model = Vec::new();

    table.insert(0, PieceKind::Original, 0, 200).unwrap();
    model_insert(&mut model, 0, PieceKind::Original, 0, 200);
    table.insert(100, PieceKind::Edit, 0, 50).unwrap();
    model_insert(&mut model, 100, PieceKind::Edit, 0, 50);

    let copies: &[(u64, u64, u64)] = &[(0, 250, 100), (80, 40, 60), (300, 0, 50)];
    for &(from, to, length) in copies {
        table.copy(from, to, length).unwrap();
        let snapshot: Vec<(PieceKind, u64)> =
            model[from as usize..(from + length) as usize].to_vec();
        model.splice(to as usize..to as usize, snapshot);
        table.validate();
        assert_eq!(expand(&table), model);
    }
}

#[test]
fn zero_length_operations_are_noops() {
    let mut table = PieceTable::new();
    table.insert(0, PieceKind::Original, 0, 100).unwrap();
    let before = expand(&table);

    table.insert(40, PieceKind::Edit, 0, 0).unwrap();
    table.delete(40, 0).unwrap();
    table.delete(100, 0).unwrap();
    table.copy(40, 60, 0).unwrap();

    assert_eq!(expand(&table), before);
    assert_eq!(table.len(), 100);
    table.validate();
}

#[test]
fn churn_across_many_splits_stays_consistent() {
    let mut table = PieceTable::new();
    let mut model = Vec::new();

    // Interleave non-chaining inserts with deletes so the tree splits,
    // fragments, and prunes repeatedly.
    for i in 0..600u64 {
        let kind = if i % 2 == 0 { PieceKind::Original } else { PieceKind::Edit };
        let position = (i * 37) % (model.len() as u64 + 1);
        table.insert(position, kind, i * 100, 5).unwrap();
        model_insert(&mut model, position, kind, i * 100, 5);

        if i % 3 == 2 {
            let position = (i * 13) % (model.len() as u64 - 6);
            table.delete(position, 7).unwrap();
            model.drain(position as usize..position as usize + 7);
        }

        if i % 50 == 49 {
            table.validate();
            assert_eq!(expand(&table), model);
        }
    }

    table.validate();
    assert_eq!(expand(&table), model);
    assert_eq!(table.len(), model.len() as u64);
}

#[test]
fn emptied_table_behaves_like_a_fresh_one() {
    let mut table = PieceTable::new();

    // Grow far enough that the tree holds several leaves, then empty it.
    for i in 0..200u64 {
        let kind = if i % 2 == 0 { PieceKind::Original } else { PieceKind::Edit };
        table.insert(table.len(), kind, i * 10, 10).unwrap();
    }
    table.delete(0, table.len()).unwrap();

    assert_eq!(table.len(), 0);
    assert!(table.is_empty());
    assert_eq!(table.pieces().count(), 0);
    table.validate();

    // An insert into the structurally valid but logically empty tree takes
    // the same path as the very first insert into a fresh table.
    let mut fresh = PieceTable::new();
    table.insert(0, PieceKind::Edit, 123, 45).unwrap();
    fresh.insert(0, PieceKind::Edit, 123, 45).unwrap();

    assert_eq!(expand(&table), expand(&fresh));
    table.validate();
    fresh.validate();
}

#[test]
fn delete_rejects_ranges_past_the_end() {
    let mut table = PieceTable::new();
    table.insert(0, PieceKind::Original, 0, 10).unwrap();

    assert!(table.delete(5, 6).is_err());
    assert!(table.delete(11, 0).is_err());
    assert!(table.delete(0, 10).is_ok());
    assert!(table.delete(0, 1).is_err());
    table.validate();
}

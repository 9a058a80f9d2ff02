use crate::{BitSet, SparseBitMatrix};

#[test]
fn insert_remove_iter() {
    let mut set: BitSet<usize> = BitSet::new_empty(200);
    assert!(set.insert(3));
    assert!(!set.insert(3));
    assert!(set.insert(130));
    assert!(set.insert(64));
    assert_eq!(set.iter().collect::<Vec<_>>(), vec![3, 64, 130]);
    assert!(set.remove(64));
    assert!(!set.remove(64));
    assert_eq!(set.count(), 2);
    assert!(set.contains(130));
    assert!(!set.contains(64));
}

#[test]
fn filled_respects_domain() {
    let set: BitSet<usize> = BitSet::new_filled(67);
    assert_eq!(set.count(), 67);
    assert_eq!(set.iter().last(), Some(66));
}

#[test]
fn union_subtract() {
    let mut a: BitSet<usize> = BitSet::new_empty(70);
    let mut b: BitSet<usize> = BitSet::new_empty(70);
    a.insert(1);
    b.insert(1);
    b.insert(69);
    assert!(a.union(&b));
    assert!(!a.union(&b));
    assert_eq!(a.iter().collect::<Vec<_>>(), vec![1, 69]);
    assert!(a.subtract(&b));
    assert!(a.is_empty());
}

#[test]
fn sparse_matrix_rows() {
    let mut matrix: SparseBitMatrix<usize, usize> = SparseBitMatrix::new(40);
    assert!(matrix.row(7).is_none());
    assert!(matrix.insert(7, 3));
    assert!(!matrix.insert(7, 3));
    assert!(matrix.insert(7, 12));
    assert!(matrix.contains(7, 12));
    assert!(!matrix.contains(8, 12));
    assert_eq!(matrix.row(7).unwrap().iter().collect::<Vec<_>>(), vec![3, 12]);
}

//! Shape utilities
use std::iter;

/// The shape that `a` and `b` broadcast to, if any.
///
/// Trailing dimensions are aligned and size-1 dimensions are expanded.
#[must_use]
pub fn broadcast_shapes<'a>(mut a: &'a [i64], mut b: &'a [i64]) -> Option<Vec<i64>> {
    // Ensure that b is not longer. It will be prepended with 1s
    if b.len() > a.len() {
        std::mem::swap(&mut a, &mut b);
    }
    let mut broadcasted = Vec::with_capacity(a.len());
    for (&ai, &bi) in a.iter().rev().zip(b.iter().rev().chain(iter::repeat(&1))) {
        if ai == bi || bi == 1 {
            broadcasted.push(ai);
        } else if ai == 1 {
            broadcasted.push(bi)
        } else {
            return None;
        }
    }
    broadcasted.reverse();
    Some(broadcasted)
}

/// Broadcast any number of shapes together.
#[must_use]
pub fn broadcast_all_shapes<S: AsRef<[i64]>>(shapes: &[S]) -> Option<Vec<i64>> {
    shapes
        .iter()
        .try_fold(Vec::new(), |acc, s| broadcast_shapes(&acc, s.as_ref()))
}

/// Convert a torch shape to `usize` dimensions.
///
/// # Panics
/// If any dimension is negative.
#[must_use]
pub fn to_usize_shape(shape: &[i64]) -> Vec<usize> {
    shape
        .iter()
        .map(|&s| s.try_into().expect("negative dimension size"))
        .collect()
}

/// Convert `usize` dimensions to a torch shape.
///
/// # Panics
/// If any dimension exceeds `i64::MAX`.
#[must_use]
pub fn to_torch_shape(shape: &[usize]) -> Vec<i64> {
    shape
        .iter()
        .map(|&s| s.try_into().expect("dimension size too large"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[], &[], Some(vec![]))]
    #[case(&[3], &[], Some(vec![3]))]
    #[case(&[1, 3, 1], &[4, 2, 1, 1], Some(vec![4, 2, 3, 1]))]
    #[case(&[2, 1], &[1, 5], Some(vec![2, 5]))]
    #[case(&[2], &[3], None)]
    #[case(&[4, 2], &[3, 2], None)]
    fn broadcast_pair(#[case] a: &[i64], #[case] b: &[i64], #[case] expected: Option<Vec<i64>>) {
        assert_eq!(broadcast_shapes(a, b), expected);
        assert_eq!(broadcast_shapes(b, a), expected);
    }

    #[test]
    fn broadcast_three() {
        let shapes: [&[i64]; 3] = [&[1], &[2, 1], &[3]];
        assert_eq!(broadcast_all_shapes(&shapes), Some(vec![2, 3]));
    }

    #[test]
    fn broadcast_three_incompatible() {
        let shapes: [&[i64]; 3] = [&[2], &[2, 1], &[3]];
        assert_eq!(broadcast_all_shapes(&shapes), None);
    }

    #[test]
    fn shape_conversion() {
        assert_eq!(to_usize_shape(&[2, 0, 3]), vec![2, 0, 3]);
        assert_eq!(to_torch_shape(&[2, 0, 3]), vec![2, 0, 3]);
    }
}

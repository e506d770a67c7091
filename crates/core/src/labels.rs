//! Class labels

/// Label attached to one trial. Cluster engines use synthetic labels `0..k`.
pub type ClassLabel = i64;

/// Distinct labels in ascending order.
pub fn unique_labels(labels: &[ClassLabel]) -> Vec<ClassLabel> {
    let mut classes = labels.to_vec();
    classes.sort_unstable();
    classes.dedup();
    classes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_labels_sorted() {
        assert_eq!(unique_labels(&[3, 1, 3, 2, 1]), vec![1, 2, 3]);
        assert!(unique_labels(&[]).is_empty());
    }
}

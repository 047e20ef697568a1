//! Edit distance

/// Levenshtein distance over Unicode scalar values
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Accept a near miss: at most 2 edits and under a third of the length
#[inline]
#[must_use]
pub fn is_near_miss(distance: usize, len: usize) -> bool {
    distance > 0 && distance <= 2 && distance * 3 < len
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_distances() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("send_mesage", "send_message"), 1);
        assert_eq!(levenshtein("ecoh", "echo"), 2);
    }

    #[test]
    fn near_miss_threshold() {
        assert!(is_near_miss(1, 11));
        assert!(is_near_miss(2, 7));
        assert!(!is_near_miss(2, 6));
        assert!(!is_near_miss(1, 3));
        assert!(!is_near_miss(0, 10));
        assert!(!is_near_miss(3, 30));
    }

    proptest! {
        #[test]
        fn symmetric(a in "[a-z_]{0,12}", b in "[a-z_]{0,12}") {
            prop_assert_eq!(levenshtein(&a, &b), levenshtein(&b, &a));
        }

        #[test]
        fn bounded_by_longer_length(a in "[a-z]{0,12}", b in "[a-z]{0,12}") {
            let d = levenshtein(&a, &b);
            prop_assert!(d <= a.len().max(b.len()));
            prop_assert_eq!(d == 0, a == b);
        }
    }
}

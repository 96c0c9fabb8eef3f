//! Helpers for quantities written per correlated-k sub-interval of a band.

/// Sums `values` over the slices that start at each index in `starts`.
pub fn combine_at(values: &[f64], starts: &[usize]) -> Vec<f64> {
    starts
        .iter()
        .enumerate()
        .map(|(position, start)| {
            let end = starts.get(position + 1).copied().unwrap_or(values.len());
            values[*start..end.max(*start)].iter().sum()
        })
        .collect()
}

/// Sums `values` over each band, where a band starts wherever `k_int` is 1.
pub fn combine_by_k_int(values: &[f64], k_int: &[i64]) -> Vec<f64> {
    let starts = k_int
        .iter()
        .enumerate()
        .filter_map(|(index, k)| (*k == 1).then_some(index))
        .collect::<Vec<_>>();
    combine_at(values, &starts)
}

/// True when `k_int` is a series of integer progressions that each start at 1.
pub fn check_k_int(k_int: &[i64]) -> bool {
    let Some(first) = k_int.first() else {
        return true;
    };
    if *first != 1 {
        return false;
    }
    k_int
        .windows(2)
        .all(|pair| pair[1] == pair[0] + 1 || pair[1] == 1)
}

#[cfg(test)]
mod tests {
    use super::{check_k_int, combine_at, combine_by_k_int};

    #[test]
    fn combine_sums_each_band() {
        let weights = [0.50, 0.50, 0.25, 0.25, 0.25, 0.25, 0.33, 0.33, 0.34];
        let k_int = [1, 2, 1, 2, 3, 4, 1, 2, 3];
        let combined = combine_by_k_int(&weights, &k_int);
        assert_eq!(combined.len(), 3);
        for value in combined {
            assert!((value - 1.0).abs() < 1e-12);
        }
        assert_eq!(combine_at(&[1.0, 2.0, 3.0], &[0, 2]), vec![3.0, 3.0]);
    }

    #[test]
    fn k_int_progressions_must_restart_at_one() {
        assert!(check_k_int(&[1, 2, 3]));
        assert!(check_k_int(&[1, 2, 3, 1, 2, 3, 4]));
        assert!(!check_k_int(&[1, 2, 3, 2, 3, 4]));
        assert!(!check_k_int(&[2, 3]));
        assert!(check_k_int(&[]));
    }
}

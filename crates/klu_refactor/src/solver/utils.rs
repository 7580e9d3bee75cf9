/// Returns true if `p` holds every index in `0..n` exactly once.
pub fn is_permutation(p: &[usize], n: usize) -> bool {
    if p.len() != n {
        return false;
    }
    let mut seen = vec![false; n];
    for &i in p {
        if i >= n || seen[i] {
            return false;
        }
        seen[i] = true;
    }
    true
}

/// pinv[p[k]] = k
pub fn inverse_permutation(p: &[usize], pinv: &mut [usize]) {
    debug_assert_eq!(p.len(), pinv.len());
    for (k, &i) in p.iter().enumerate() {
        pinv[i] = k;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[0, 1, 2], 3, true)]
    #[case(&[2, 0, 1], 3, true)]
    #[case(&[0, 0, 1], 3, false)]
    #[case(&[0, 3, 1], 3, false)]
    #[case(&[0, 1], 3, false)]
    fn detects_permutations(#[case] p: &[usize], #[case] n: usize, #[case] expected: bool) {
        assert_eq!(is_permutation(p, n), expected);
    }

    #[test]
    fn inverse_of_cycle() {
        let p = [2, 0, 1];
        let mut pinv = [0; 3];
        inverse_permutation(&p, &mut pinv);
        assert_eq!(pinv, [1, 2, 0]);
    }
}

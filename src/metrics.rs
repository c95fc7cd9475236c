//! Compression-distance formulas and byte-level measures
//!
//! Everything here is pure: the compressed sizes come from whichever
//! compressor the caller selected.
//!
//! With `C(x)` the compressed size of `x` and `xy` the concatenation:
//!
//! ```text
//! NCD(x, y)  = (C(xy) - min(C(x), C(y))) / max(C(x), C(y))
//! NCS(x, y)  = 1 - NCD(x, y)
//! CMID(x, y) = (C(x) + C(y) - C(xy)) / min(C(x), C(y))
//! ```

/// Normalized Compression Distance.
///
/// `0.0` when both inputs compress to nothing.
///
/// # Examples
///
/// ```
/// use compsim::metrics::ncd;
///
/// assert_eq!(ncd(10, 10, 10), 0.0);
/// assert_eq!(ncd(10, 10, 20), 1.0);
/// assert_eq!(ncd(0, 0, 0), 0.0);
/// ```
pub fn ncd(size_a: u64, size_b: u64, size_ab: u64) -> f64 {
    let max_c = size_a.max(size_b) as f64;
    if max_c == 0.0 {
        return 0.0;
    }
    let min_c = size_a.min(size_b) as f64;
    (size_ab as f64 - min_c) / max_c
}

/// Normalized Compression Similarity, the complement of [`ncd`].
pub fn ncs(size_a: u64, size_b: u64, size_ab: u64) -> f64 {
    1.0 - ncd(size_a, size_b, size_ab)
}

/// Compression-based mutual information, normalized by the smaller input.
///
/// Approaches `1.0` when the smaller buffer is fully explained by the other
/// one, `0.0` when the two share nothing.
pub fn cmid(size_a: u64, size_b: u64, size_ab: u64) -> f64 {
    let min_c = size_a.min(size_b) as f64;
    if min_c == 0.0 {
        return 0.0;
    }
    (size_a as f64 + size_b as f64 - size_ab as f64) / min_c
}

/// Shannon entropy in bits per byte.
///
/// # Examples
///
/// ```
/// use compsim::metrics::entropy;
///
/// assert_eq!(entropy(b""), 0.0);
/// assert_eq!(entropy(b"aaaa"), 0.0);
/// assert!((entropy(b"abab") - 1.0).abs() < 1e-12);
/// ```
pub fn entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut counts = [0u64; 256];
    for &byte in data {
        counts[byte as usize] += 1;
    }

    let total = data.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Byte-level edit distance with unit costs.
pub fn levenshtein(a: &[u8], b: &[u8]) -> u64 {
    // Keep the row as short as possible.
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return long.len() as u64;
    }

    let mut prev: Vec<u64> = (0..=short.len() as u64).collect();
    let mut curr = vec![0u64; short.len() + 1];

    for (i, &lc) in long.iter().enumerate() {
        curr[0] = i as u64 + 1;
        for (j, &sc) in short.iter().enumerate() {
            let substitution = prev[j] + u64::from(lc != sc);
            let deletion = prev[j + 1] + 1;
            let insertion = curr[j] + 1;
            curr[j + 1] = substitution.min(deletion).min(insertion);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[short.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_classic_cases() {
        assert_eq!(levenshtein(b"kitten", b"sitting"), 3);
        assert_eq!(levenshtein(b"flaw", b"lawn"), 2);
        assert_eq!(levenshtein(b"", b"abc"), 3);
        assert_eq!(levenshtein(b"same", b"same"), 0);
    }

    #[test]
    fn cmid_full_overlap() {
        // C(ab) == C(a) when b adds nothing
        assert_eq!(cmid(40, 20, 40), 1.0);
        assert_eq!(cmid(40, 20, 60), 0.0);
        assert_eq!(cmid(0, 20, 20), 0.0);
    }

    #[test]
    fn ncs_complements_ncd() {
        let d = ncd(30, 50, 65);
        assert!((ncs(30, 50, 65) - (1.0 - d)).abs() < 1e-12);
    }

    #[test]
    fn entropy_of_all_bytes_is_eight_bits() {
        let data: Vec<u8> = (0..=255u8).collect();
        assert!((entropy(&data) - 8.0).abs() < 1e-9);
    }
}

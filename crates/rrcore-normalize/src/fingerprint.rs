use rrcore_types::Fingerprint;

/// `BLAKE3(normalized_bytes)` (spec.md §4.2). Pure, deterministic, thread-safe.
pub fn fingerprint(normalized_bytes: &[u8]) -> Fingerprint {
    Fingerprint(*blake3::hash(normalized_bytes).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_fingerprint() {
        let a = fingerprint(b"hello");
        let b = fingerprint(b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn different_bytes_different_fingerprint() {
        let a = fingerprint(b"hello");
        let b = fingerprint(b"hellp");
        assert_ne!(a, b);
    }
}

/// djb2 string hash (`h = h * 33 + byte`, starting at 5381)
///
/// Used to derive raw-page file names from URLs and token ids from tokens,
/// so the same input always lands in the same place.
pub fn djb2(input: &str) -> u64 {
    input.bytes().fold(5381u64, |hash, byte| {
        hash.wrapping_shl(5)
            .wrapping_add(hash)
            .wrapping_add(u64::from(byte))
    })
}

/// Polynomial URL hash (`h = h * 31 + byte`) used to seed score randomization
pub fn url_hash(url: &str) -> u64 {
    url.bytes().fold(0u64, |hash, byte| {
        hash.wrapping_mul(31).wrapping_add(u64::from(byte))
    })
}

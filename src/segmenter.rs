//! Splits an application message into UDP-safe fragments.

/// One outbound fragment: the remaining-fragment countdown (zero on the
/// final fragment) and its slice of the original message.
pub struct Segment {
    pub remaining: u32,
    pub bytes: Vec<u8>,
}

/// Splits `message` into `ceil(message.len() / max_segment_size)` segments.
/// A zero-length message produces no segments — callers must not invoke
/// `send_message` with empty bytes; this function simply returns nothing.
pub fn split_message(message: &[u8], max_segment_size: usize) -> Vec<Segment> {
    if message.is_empty() {
        return Vec::new();
    }
    assert!(max_segment_size > 0, "segment size must be positive");

    let chunks: Vec<&[u8]> = message.chunks(max_segment_size).collect();
    let count = chunks.len() as u32;
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| Segment {
            remaining: count - 1 - i as u32,
            bytes: chunk.to_vec(),
        })
        .collect()
}

use std::num::NonZeroUsize;

/// Split `items` into consecutive chunks of `size`, the last possibly shorter.
///
/// Order is preserved and an empty input yields no chunks.
pub fn split_batches<T>(items: Vec<T>, size: NonZeroUsize) -> Vec<Vec<T>> {
    let size = size.get();
    let mut chunks = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter().peekable();

    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(size).collect());
    }

    chunks
}

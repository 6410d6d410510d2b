use crate::error::Result;

/// Processes `items` in consecutive windows of at most `size` elements.
///
/// `process` builds whatever per-window state it needs (decoded images,
/// detector output) and returns it; `release` receives that state once the
/// window is done and is the only place it is dropped. Nothing from one
/// window is alive while the next one is processed, so peak memory is bounded
/// by the window size rather than by `items.len()`.
pub fn process_in_windows<T, W, P, R>(
    items: &[T],
    size: usize,
    mut process: P,
    mut release: R,
) -> Result<()>
where
    P: FnMut(usize, &[T]) -> Result<W>,
    R: FnMut(usize, W),
{
    for (window_idx, window) in items.chunks(size.max(1)).enumerate() {
        let state = process(window_idx, window)?;
        release(window_idx, state);
    }
    Ok(())
}

//! Round-robin selection over the sender pool.
//!
//! The cursor is an unbounded counter persisted in the session; the active
//! sender is `cursor mod N`. An empty pool is rejected before any modulo.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RotationError {
    #[error("no sender available: the sender pool is empty")]
    EmptyPool,
}

/// Index of the sender whose turn it is.
pub fn active_index(pool_len: usize, cursor: usize) -> Result<usize, RotationError> {
    if pool_len == 0 {
        return Err(RotationError::EmptyPool);
    }
    Ok(cursor % pool_len)
}

/// Cursor after one successful send.
pub fn next_cursor(pool_len: usize, cursor: usize) -> Result<usize, RotationError> {
    let idx = active_index(pool_len, cursor)?;
    Ok((idx + 1) % pool_len)
}

/// Pick the active entry of `pool` and return it with the advanced cursor.
pub fn rotate_cursor<T>(pool: &[T], cursor: usize) -> Result<(&T, usize), RotationError> {
    let idx = active_index(pool.len(), cursor)?;
    Ok((&pool[idx], (idx + 1) % pool.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pool_is_rejected() {
        assert_eq!(active_index(0, 0), Err(RotationError::EmptyPool));
        assert_eq!(next_cursor(0, 5), Err(RotationError::EmptyPool));
        let pool: [&str; 0] = [];
        assert!(rotate_cursor(&pool, 0).is_err());
    }

    #[test]
    fn test_active_index_wraps() {
        assert_eq!(active_index(3, 0).unwrap(), 0);
        assert_eq!(active_index(3, 4).unwrap(), 1);
        assert_eq!(active_index(1, 99).unwrap(), 0);
    }

    #[test]
    fn test_full_cycle_returns_to_start() {
        for pool_len in 1..=5 {
            for start in 0..pool_len {
                let mut cursor = start;
                for _ in 0..pool_len {
                    cursor = next_cursor(pool_len, cursor).unwrap();
                }
                assert_eq!(cursor, start, "pool of {}", pool_len);
            }
        }
    }

    #[test]
    fn test_rotate_cursor_over_slice() {
        let pool = ["a@x.com", "b@x.com"];
        let (sender, cursor) = rotate_cursor(&pool, 0).unwrap();
        assert_eq!(*sender, "a@x.com");
        assert_eq!(cursor, 1);

        let (sender, cursor) = rotate_cursor(&pool, cursor).unwrap();
        assert_eq!(*sender, "b@x.com");
        assert_eq!(cursor, 0);
    }

    #[test]
    fn test_stale_cursor_beyond_pool_is_normalized() {
        // A pool that shrank leaves the cursor out of range.
        assert_eq!(next_cursor(2, 7).unwrap(), 0);
    }
}

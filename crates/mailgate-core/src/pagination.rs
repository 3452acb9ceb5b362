//! Newest-first cursor pagination over a mailbox's UIDs.
//!
//! The cursor is the last UID of the previous page. UIDs only grow, so
//! paging by UID stays stable while new mail arrives: new messages land
//! before the first page and never shift later pages.

/// Page size used when the caller gives none.
pub const DEFAULT_LIMIT: usize = 20;

/// Largest page a caller may ask for.
pub const MAX_LIMIT: usize = 50;

/// One page of UIDs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Page {
    /// UIDs on this page, descending.
    pub uids: Vec<u32>,
    /// Cursor for the next page, `None` on the last page.
    pub next_cursor: Option<u32>,
}

/// Applies the default and bounds to a requested page size.
#[must_use]
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Cuts one page out of an unordered UID list.
///
/// With a cursor, the page holds the UIDs strictly older than it. A cursor
/// that is not in the list restarts from the newest message.
#[must_use]
pub fn paginate(uids: &[u32], cursor: Option<u32>, limit: usize) -> Page {
    let limit = limit.clamp(1, MAX_LIMIT);

    let mut sorted = uids.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted.dedup();

    let start = cursor
        .and_then(|c| sorted.iter().position(|&uid| uid == c))
        .map_or(0, |pos| pos + 1);
    let end = (start + limit).min(sorted.len());

    let page = sorted.get(start..end).unwrap_or_default().to_vec();
    let next_cursor = if end < sorted.len() {
        page.last().copied()
    } else {
        None
    };

    Page {
        uids: page,
        next_cursor,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_and_second_page() {
        let uids: Vec<u32> = (1..=25).collect();

        let first = paginate(&uids, None, 20);
        assert_eq!(first.uids, (6..=25).rev().collect::<Vec<_>>());
        assert_eq!(first.next_cursor, Some(6));

        let second = paginate(&uids, Some(6), 20);
        assert_eq!(second.uids, vec![5, 4, 3, 2, 1]);
        assert_eq!(second.next_cursor, None);
    }

    #[test]
    fn unknown_cursor_restarts() {
        let uids = [10, 30, 20];
        assert_eq!(paginate(&uids, Some(999), 2), paginate(&uids, None, 2));
        assert_eq!(paginate(&uids, None, 2).uids, vec![30, 20]);
    }

    #[test]
    fn gaps_are_not_filled() {
        let page = paginate(&[3, 900, 42], None, 20);
        assert_eq!(page.uids, vec![900, 42, 3]);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn cursor_on_the_oldest_uid_is_empty() {
        let page = paginate(&[1, 2, 3], Some(1), 20);
        assert!(page.uids.is_empty());
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn empty_mailbox() {
        assert_eq!(paginate(&[], None, 20), Page::default());
    }

    #[test]
    fn limits_are_clamped() {
        assert_eq!(clamp_limit(None), 20);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(500)), 50);
        let uids: Vec<u32> = (1..=100).collect();
        assert_eq!(paginate(&uids, None, 0).uids.len(), 1);
        assert_eq!(paginate(&uids, None, 99).uids.len(), 50);
    }

    proptest! {
        #[test]
        fn walking_every_page_yields_each_uid_once(
            uids in proptest::collection::hash_set(1u32..10_000, 0..300),
            limit in 1usize..60,
        ) {
            let uids: Vec<u32> = uids.into_iter().collect();
            let mut seen = Vec::new();
            let mut cursor = None;
            loop {
                let page = paginate(&uids, cursor, limit);
                seen.extend(page.uids.iter().copied());
                match page.next_cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }

            let mut expected = uids.clone();
            expected.sort_unstable_by(|a, b| b.cmp(a));
            prop_assert_eq!(seen, expected);
        }
    }
}

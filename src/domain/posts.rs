//! Post visibility, ranking and summary rules shared by every store backend.

use std::cmp::Ordering;

use time::OffsetDateTime;

use crate::domain::entities::PostRecord;
use crate::domain::types::{PostSort, PostStatus};

/// Weight of a single like relative to a single view in the popularity score.
pub const LIKE_WEIGHT: i64 = 2;

/// Maximum number of characters kept in a listing excerpt.
pub const EXCERPT_CHARS: usize = 160;

impl PostRecord {
    /// A post is publicly visible once it is published and its publication
    /// instant is not in the future.
    pub fn is_visible_at(&self, now: OffsetDateTime) -> bool {
        self.status == PostStatus::Published
            && self
                .published_at
                .is_some_and(|published_at| published_at <= now)
    }

    pub fn popularity(&self) -> i128 {
        popularity_score(self.views_count, self.likes_count)
    }

    /// Case-insensitive substring match against the title or the content.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.content.to_lowercase().contains(&needle)
    }
}

/// Exact score; widened so counters near `i64::MAX` still order correctly.
pub fn popularity_score(views_count: i64, likes_count: i64) -> i128 {
    i128::from(views_count) + i128::from(likes_count) * i128::from(LIKE_WEIGHT)
}

/// Total order used for listings. Every sort key falls back to recency and
/// then to the id so that pages never overlap.
pub fn compare_for_sort(sort: PostSort, left: &PostRecord, right: &PostRecord) -> Ordering {
    let recency = right
        .published_at
        .cmp(&left.published_at)
        .then_with(|| right.id.cmp(&left.id));

    match sort {
        PostSort::Newest => recency,
        PostSort::Oldest => left
            .published_at
            .cmp(&right.published_at)
            .then_with(|| left.id.cmp(&right.id)),
        PostSort::Popular => right.popularity().cmp(&left.popularity()).then(recency),
    }
}

/// Collapse whitespace and cut the content down to `max_chars` characters.
pub fn excerpt(content: &str, max_chars: usize) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }

    let mut cut: String = collapsed.chars().take(max_chars).collect();
    let trimmed_len = cut.trim_end().len();
    cut.truncate(trimmed_len);
    cut.push('…');
    cut
}

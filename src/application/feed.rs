use crate::domain::{DomainError, FeedRequest, FeedResponse, PhotoRecord, RequestContext};
use std::cmp::Ordering;
use std::ops::Range;

use super::service::PhotoService;

pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Newest first, then higher confidence, then lower id. Ids are unique so
/// no two records compare equal.
pub fn feed_order(a: &PhotoRecord, b: &PhotoRecord) -> Ordering {
    b.upload_time
        .cmp(&a.upload_time)
        .then_with(|| b.avg_confidence().total_cmp(&a.avg_confidence()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Index range of a 1-based page over `len` items, clamped to `0..len`.
/// Non-positive sizes and numbers fall back to the defaults.
pub fn page_range(len: usize, page_size: i32, page_number: i32) -> Range<usize> {
    let size = if page_size <= 0 { DEFAULT_PAGE_SIZE } else { page_size as i64 };
    let number = if page_number <= 0 { 1 } else { page_number as i64 };
    let len = len as i64;

    let start = ((number - 1) * size).clamp(0, len);
    let end = (number * size).clamp(start, len);
    start as usize..end as usize
}

impl PhotoService {
    pub async fn feed(
        &self,
        ctx: &RequestContext,
        req: FeedRequest,
    ) -> Result<FeedResponse, DomainError> {
        let mut records = self.store(ctx, |repo| repo.list_all()).await?;
        records.sort_by(feed_order);

        let range = page_range(records.len(), req.page_size, req.page_number);
        let images = records.drain(range).map(Into::into).collect();
        Ok(FeedResponse { images })
    }
}

use crate::domain::model::{BookId, BookInfo, Review};
use crate::domain::ports::{BookInfoService, ReviewService};
use crate::utils::error::{SourceError, SourceResult};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 失敗注入與呼叫計數，兩個記憶體服務共用
#[derive(Debug, Clone, Default)]
struct CallLedger {
    calls: Arc<AtomicUsize>,
    remaining_failures: Arc<AtomicU32>,
}

impl CallLedger {
    /// 記錄一次呼叫，回傳這次是否該失敗
    fn record(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail_first(&self, count: u32) {
        self.remaining_failures.store(count, Ordering::SeqCst);
    }
}

async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

fn delayed_stream<T: Send + 'static>(
    latency: Duration,
    items: Vec<SourceResult<T>>,
) -> BoxStream<'static, SourceResult<T>> {
    stream::once(async move {
        simulate_latency(latency).await;
        stream::iter(items)
    })
    .flatten()
    .boxed()
}

#[derive(Debug, Clone)]
pub struct InMemoryBookInfoService {
    books: Arc<Vec<BookInfo>>,
    latency: Duration,
    missing_as_empty: bool,
    list_ledger: CallLedger,
    get_calls: Arc<AtomicUsize>,
}

impl InMemoryBookInfoService {
    pub fn new(books: Vec<BookInfo>) -> Self {
        Self {
            books: Arc::new(books),
            latency: Duration::ZERO,
            missing_as_empty: false,
            list_ledger: CallLedger::default(),
            get_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// 前 `count` 次 `list` 呼叫回傳 `SourceError::Unavailable`
    pub fn fail_first(self, count: u32) -> Self {
        self.list_ledger.fail_first(count);
        self
    }

    /// 找不到時回傳空值而不是 `SourceError::NotFound`
    pub fn with_missing_as_empty(mut self) -> Self {
        self.missing_as_empty = true;
        self
    }

    /// `list` 被呼叫的次數，也就是管線被執行的次數
    pub fn calls(&self) -> usize {
        self.list_ledger.calls()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BookInfoService for InMemoryBookInfoService {
    fn list(&self) -> BoxStream<'static, SourceResult<BookInfo>> {
        let items = if self.list_ledger.record() {
            tracing::debug!("💥 Simulated book info failure");
            vec![Err(SourceError::Unavailable(
                "book info service unavailable".to_string(),
            ))]
        } else {
            self.books.iter().cloned().map(Ok).collect()
        };
        delayed_stream(self.latency, items)
    }

    async fn get(&self, book_id: BookId) -> SourceResult<Option<BookInfo>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        simulate_latency(self.latency).await;

        match self.books.iter().find(|b| b.book_id == book_id) {
            Some(book) => Ok(Some(book.clone())),
            None if self.missing_as_empty => Ok(None),
            None => Err(SourceError::NotFound(book_id)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryReviewService {
    reviews: Arc<HashMap<BookId, Vec<Review>>>,
    latency: Duration,
    ledger: CallLedger,
}

impl InMemoryReviewService {
    /// 依 `book_id` 分組，保留原本的順序
    pub fn new(reviews: Vec<Review>) -> Self {
        let mut grouped: HashMap<BookId, Vec<Review>> = HashMap::new();
        for review in reviews {
            grouped.entry(review.book_id).or_default().push(review);
        }
        Self::from_map(grouped)
    }

    pub fn from_map(reviews: HashMap<BookId, Vec<Review>>) -> Self {
        Self {
            reviews: Arc::new(reviews),
            latency: Duration::ZERO,
            ledger: CallLedger::default(),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// 前 `count` 次 `list_by_book_id` 呼叫回傳 `SourceError::Unavailable`
    pub fn fail_first(self, count: u32) -> Self {
        self.ledger.fail_first(count);
        self
    }

    pub fn calls(&self) -> usize {
        self.ledger.calls()
    }
}

impl ReviewService for InMemoryReviewService {
    fn list_by_book_id(&self, book_id: BookId) -> BoxStream<'static, SourceResult<Review>> {
        let items = if self.ledger.record() {
            tracing::debug!("💥 Simulated review failure for book {}", book_id);
            vec![Err(SourceError::Unavailable(format!(
                "review service unavailable for book {}",
                book_id
            )))]
        } else {
            self.reviews
                .get(&book_id)
                .map(|reviews| reviews.iter().cloned().map(Ok).collect())
                .unwrap_or_default()
        };
        delayed_stream(self.latency, items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn review(review_id: u64, book_id: BookId) -> Review {
        Review {
            review_id,
            book_id,
            rating: 3.5,
            comment: format!("review {}", review_id),
        }
    }

    #[tokio::test]
    async fn test_reviews_grouped_in_order() {
        let service = InMemoryReviewService::new(vec![review(3, 1), review(1, 2), review(2, 1)]);

        let reviews: Vec<Review> = service.list_by_book_id(1).try_collect().await.unwrap();
        let ids: Vec<u64> = reviews.iter().map(|r| r.review_id).collect();

        assert_eq!(ids, vec![3, 2]);
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_book_has_no_reviews() {
        let service = InMemoryReviewService::new(vec![review(1, 1)]);
        let reviews: Vec<Review> = service.list_by_book_id(42).try_collect().await.unwrap();
        assert!(reviews.is_empty());
    }

    #[tokio::test]
    async fn test_fail_first_consumes_failures() {
        let service = InMemoryReviewService::new(vec![review(1, 1)]).fail_first(1);

        let first: SourceResult<Vec<Review>> = service.list_by_book_id(1).try_collect().await;
        let second: SourceResult<Vec<Review>> = service.list_by_book_id(1).try_collect().await;

        assert!(matches!(first, Err(SourceError::Unavailable(_))));
        assert_eq!(second.unwrap().len(), 1);
        assert_eq!(service.calls(), 2);
    }

    #[tokio::test]
    async fn test_get_missing_book() {
        let strict = InMemoryBookInfoService::new(vec![]);
        assert_eq!(strict.get(9).await, Err(SourceError::NotFound(9)));

        let lenient = InMemoryBookInfoService::new(vec![]).with_missing_as_empty();
        assert_eq!(lenient.get(9).await, Ok(None));
        assert_eq!(lenient.get_calls(), 1);
    }
}

use crate::core::join::JoinPipeline;
use crate::core::retry::{RetryExecutor, RetryPolicy, Sleeper, TokioSleeper};
use crate::domain::model::{Book, BookId, Review};
use crate::domain::ports::{BookInfoService, NoopObserver, PipelineObserver, ReviewService};
use crate::utils::error::{BookError, Result};
use futures::stream::BoxStream;
use futures::TryStreamExt;
use std::sync::Arc;

/// 書籍查詢服務：同一條 join 管線，搭配可替換的重試策略
pub struct BookService<I, R> {
    infos: Arc<I>,
    reviews: Arc<R>,
    concurrency: Option<usize>,
    observer: Arc<dyn PipelineObserver>,
    sleeper: Arc<dyn Sleeper>,
}

impl<I, R> BookService<I, R>
where
    I: BookInfoService + 'static,
    R: ReviewService + 'static,
{
    pub fn new(infos: I, reviews: R) -> Self {
        Self::from_shared(Arc::new(infos), Arc::new(reviews))
    }

    pub fn from_shared(infos: Arc<I>, reviews: Arc<R>) -> Self {
        Self {
            infos,
            reviews,
            concurrency: None,
            observer: Arc::new(NoopObserver),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_concurrency(mut self, concurrency: Option<usize>) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    fn pipeline(&self, name: &str) -> JoinPipeline<I, R> {
        JoinPipeline::new(Arc::clone(&self.infos), Arc::clone(&self.reviews))
            .with_name(name)
            .with_concurrency(self.concurrency)
            .with_observer(Arc::clone(&self.observer))
    }

    /// 不重試的惰性串流；drop 即取消
    pub fn stream_books(&self) -> BoxStream<'static, Result<Book>> {
        self.pipeline("books").books()
    }

    /// 依 `policy` 執行完整 join 並收集結果。每次重試都從 `list()` 重新開始。
    pub async fn get_books(&self, policy: &RetryPolicy) -> Result<Vec<Book>> {
        let executor = RetryExecutor::new("books", *policy)
            .with_sleeper(Arc::clone(&self.sleeper))
            .with_observer(Arc::clone(&self.observer));

        executor
            .execute(|attempt| {
                let books = self.pipeline("books").books();
                async move {
                    tracing::debug!("📚 Running book join (attempt {})", attempt);
                    books.try_collect::<Vec<Book>>().await
                }
            })
            .await
    }

    /// 同時查詢 BookInfo 與評論，兩邊都成功才配對。評論保持來源的順序。
    pub async fn get_book_by_id(&self, book_id: BookId) -> Result<Option<Book>> {
        let info = async {
            self.infos
                .get(book_id)
                .await
                .map_err(BookError::lookup)
        };
        let reviews = async {
            self.reviews
                .list_by_book_id(book_id)
                .try_collect::<Vec<Review>>()
                .await
                .map_err(BookError::lookup)
        };

        let (info, reviews) = futures::try_join!(info, reviews)?;

        match info {
            Some(info) => {
                tracing::debug!("📗 Book {} resolved with {} reviews", book_id, reviews.len());
                Ok(Some(Book::new(info, reviews)))
            }
            None => {
                tracing::debug!("📭 Book {} not present", book_id);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::in_memory::{InMemoryBookInfoService, InMemoryReviewService};
    use crate::core::retry::TrackingSleeper;
    use crate::domain::model::BookInfo;
    use std::time::Duration;

    fn catalog() -> (InMemoryBookInfoService, InMemoryReviewService) {
        let infos = vec![BookInfo {
            book_id: 1,
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            isbn: "978-0441013593".to_string(),
        }];
        let reviews = vec![Review {
            review_id: 1,
            book_id: 1,
            rating: 5.0,
            comment: "Classic".to_string(),
        }];
        (
            InMemoryBookInfoService::new(infos),
            InMemoryReviewService::new(reviews),
        )
    }

    #[tokio::test]
    async fn test_get_books_without_retry() {
        let (infos, reviews) = catalog();
        let service = BookService::new(infos, reviews);

        let books = service.get_books(&RetryPolicy::None).await.unwrap();

        assert_eq!(books.len(), 1);
        assert_eq!(books[0].info.title, "Dune");
        assert_eq!(books[0].average_rating(), Some(5.0));
    }

    #[tokio::test]
    async fn test_get_books_none_policy_surfaces_lookup_failure() {
        let (infos, reviews) = catalog();
        let infos = Arc::new(infos.fail_first(1));
        let service = BookService::from_shared(Arc::clone(&infos), Arc::new(reviews));

        let result = service.get_books(&RetryPolicy::None).await;

        assert!(matches!(result, Err(BookError::Lookup { .. })));
        assert_eq!(infos.calls(), 1);
    }

    #[tokio::test]
    async fn test_backoff_waits_between_attempts() {
        let (infos, reviews) = catalog();
        let sleeper = TrackingSleeper::new();
        let service = BookService::new(infos.fail_first(2), reviews)
            .with_sleeper(Arc::new(sleeper.clone()));

        let books = service
            .get_books(&RetryPolicy::backoff(3, Duration::from_millis(100)))
            .await
            .unwrap();

        assert_eq!(books.len(), 1);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[tokio::test]
    async fn test_get_book_by_id_missing_as_empty() {
        let (infos, reviews) = catalog();
        let service = BookService::new(infos.with_missing_as_empty(), reviews);

        assert!(service.get_book_by_id(2).await.unwrap().is_none());
        assert!(service.get_book_by_id(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_book_by_id_not_found_is_lookup_failure() {
        let (infos, reviews) = catalog();
        let service = BookService::new(infos, reviews);

        let result = service.get_book_by_id(2).await;
        assert!(matches!(result, Err(BookError::Lookup { .. })));
    }
}

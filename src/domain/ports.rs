use crate::domain::model::{Book, BookId, BookInfo, Review};
use crate::utils::error::{BookError, SourceResult};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::time::Duration;

/// 書籍基本資料來源。`list` 回傳惰性串流，被 poll 時才開始工作。
#[async_trait]
pub trait BookInfoService: Send + Sync {
    fn list(&self) -> BoxStream<'static, SourceResult<BookInfo>>;

    async fn get(&self, book_id: BookId) -> SourceResult<Option<BookInfo>>;
}

pub trait ReviewService: Send + Sync {
    fn list_by_book_id(&self, book_id: BookId) -> BoxStream<'static, SourceResult<Review>>;
}

/// 管線事件的觀察介面，由呼叫端注入。預設實作全部為空操作。
pub trait PipelineObserver: Send + Sync {
    fn on_subscribe(&self, _pipeline: &str) {}

    fn on_next(&self, _pipeline: &str, _book: &Book) {}

    fn on_error(&self, _pipeline: &str, _error: &BookError) {}

    fn on_complete(&self, _pipeline: &str, _emitted: usize) {}

    fn on_retry(&self, _pipeline: &str, _attempt: u32, _delay: Duration, _error: &BookError) {}
}

/// 不做任何事的觀察者
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

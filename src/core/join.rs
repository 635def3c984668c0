use crate::domain::model::{Book, BookInfo, Review};
use crate::domain::ports::{BookInfoService, NoopObserver, PipelineObserver, ReviewService};
use crate::utils::error::{BookError, Result};
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;

/// BookInfo 與 Review 的 join 管線。
///
/// 每個 BookInfo 各自查詢並收集評論後才組成 Book；不同書之間並行，輸出順序不保證。
/// 第一個錯誤之後串流即結束。串流被 drop 時所有尚未完成的查詢一併取消。
pub struct JoinPipeline<I, R> {
    name: String,
    infos: Arc<I>,
    reviews: Arc<R>,
    concurrency: Option<usize>,
    observer: Arc<dyn PipelineObserver>,
}

impl<I, R> JoinPipeline<I, R>
where
    I: BookInfoService + 'static,
    R: ReviewService + 'static,
{
    pub fn new(infos: Arc<I>, reviews: Arc<R>) -> Self {
        Self {
            name: "books".to_string(),
            infos,
            reviews,
            concurrency: None,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// `None` 代表不限制同時進行的評論查詢數
    pub fn with_concurrency(mut self, concurrency: Option<usize>) -> Self {
        self.concurrency = concurrency.map(|limit| limit.max(1));
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn books(&self) -> BoxStream<'static, Result<Book>> {
        let reviews = Arc::clone(&self.reviews);
        let limit = self.concurrency.unwrap_or(usize::MAX);

        let joined = self
            .infos
            .list()
            .map(move |info| join_reviews(Arc::clone(&reviews), info))
            .buffer_unordered(limit)
            .boxed();

        terminate_on_error(joined, self.name.clone(), Arc::clone(&self.observer))
    }
}

async fn join_reviews<R: ReviewService>(
    reviews: Arc<R>,
    info: crate::utils::error::SourceResult<BookInfo>,
) -> Result<Book> {
    let info = info.map_err(BookError::lookup)?;
    tracing::debug!("📚 Fetching reviews for book {}", info.book_id);

    let collected: Vec<Review> = reviews
        .list_by_book_id(info.book_id)
        .try_collect()
        .await
        .map_err(BookError::lookup)?;

    if let Some(stray) = collected.iter().find(|r| r.book_id != info.book_id) {
        return Err(BookError::Integrity {
            review_id: stray.review_id,
            expected: info.book_id,
            found: stray.book_id,
        });
    }

    Ok(Book::new(info, collected))
}

struct Emission {
    inner: BoxStream<'static, Result<Book>>,
    name: String,
    observer: Arc<dyn PipelineObserver>,
    subscribed: bool,
    emitted: usize,
    done: bool,
}

/// 第一個錯誤往下游送出後就結束串流，並把訂閱/元素/錯誤/完成事件交給 observer
fn terminate_on_error(
    inner: BoxStream<'static, Result<Book>>,
    name: String,
    observer: Arc<dyn PipelineObserver>,
) -> BoxStream<'static, Result<Book>> {
    let state = Emission {
        inner,
        name,
        observer,
        subscribed: false,
        emitted: 0,
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        if !state.subscribed {
            state.subscribed = true;
            tracing::info!("🚀 {}: subscribed", state.name);
            state.observer.on_subscribe(&state.name);
        }

        match state.inner.next().await {
            Some(Ok(book)) => {
                state.emitted += 1;
                tracing::debug!("📗 {}: emitted book {}", state.name, book.id());
                state.observer.on_next(&state.name, &book);
                Some((Ok(book), state))
            }
            Some(Err(error)) => {
                state.done = true;
                tracing::error!("❌ {}: {}", state.name, error);
                state.observer.on_error(&state.name, &error);
                Some((Err(error), state))
            }
            None => {
                tracing::info!("✅ {}: completed with {} books", state.name, state.emitted);
                state.observer.on_complete(&state.name, state.emitted);
                None
            }
        }
    })
    .boxed()
}

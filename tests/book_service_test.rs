mod common;

use common::{book_info, review, reviews_for, sample_catalog, Event, RecordingObserver};
use futures::StreamExt;
use reactive_books::core::retry::TrackingSleeper;
use reactive_books::{
    BookError, BookService, InMemoryBookInfoService, InMemoryReviewService, RetryPolicy,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn shared_catalog() -> (Arc<InMemoryBookInfoService>, Arc<InMemoryReviewService>) {
    let (books, reviews) = sample_catalog();
    (
        Arc::new(InMemoryBookInfoService::new(books)),
        Arc::new(InMemoryReviewService::new(reviews)),
    )
}

#[tokio::test]
async fn test_every_book_carries_its_full_review_list() {
    let (books, reviews) = sample_catalog();
    let service = BookService::new(
        InMemoryBookInfoService::new(books.clone()),
        InMemoryReviewService::new(reviews.clone()),
    );

    let mut result = assert_ok!(service.get_books(&RetryPolicy::None).await);
    result.sort_by_key(|b| b.id());

    assert_eq!(result.len(), books.len());
    for (book, info) in result.iter().zip(&books) {
        assert_eq!(&book.info, info);
        assert_eq!(book.reviews, reviews_for(&reviews, info.book_id));
    }
    assert!(result[4].reviews.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_join_with_latency() {
    let (books, reviews) = sample_catalog();
    let service = BookService::new(
        InMemoryBookInfoService::new(books).with_latency(Duration::from_millis(10)),
        InMemoryReviewService::new(reviews).with_latency(Duration::from_millis(100)),
    );

    let start = tokio::time::Instant::now();
    let result = assert_ok!(service.get_books(&RetryPolicy::None).await);

    assert_eq!(result.len(), 5);
    // 五個評論查詢同時進行，不是依序 5 x 100ms
    assert!(start.elapsed() < Duration::from_millis(300));
}

#[tokio::test]
async fn test_fixed_retry_recovers_after_k_failures() {
    let max_retries = 3;

    for failures in 0..max_retries {
        let (books, reviews) = sample_catalog();
        let infos = Arc::new(InMemoryBookInfoService::new(books).fail_first(failures));
        let observer = RecordingObserver::new();
        let service =
            BookService::from_shared(Arc::clone(&infos), Arc::new(InMemoryReviewService::new(reviews)))
                .with_observer(Arc::new(observer.clone()));

        let result = service.get_books(&RetryPolicy::fixed(max_retries)).await;

        assert_eq!(assert_ok!(result).len(), 5);
        assert_eq!(infos.calls(), failures as usize + 1);
        assert_eq!(observer.retries().len(), failures as usize);
    }
}

#[tokio::test]
async fn test_fixed_retry_restarts_after_review_failure() {
    let (infos, _) = shared_catalog();
    let (_, reviews) = sample_catalog();
    let reviews = Arc::new(InMemoryReviewService::new(reviews).fail_first(1));
    let service = BookService::from_shared(Arc::clone(&infos), Arc::clone(&reviews))
        .with_concurrency(Some(1));

    let result = assert_ok!(service.get_books(&RetryPolicy::fixed(1)).await);

    assert_eq!(result.len(), 5);
    // 第一次執行在第一本書就失敗，第二次從頭完整跑完
    assert_eq!(infos.calls(), 2);
    assert_eq!(reviews.calls(), 6);
}

#[tokio::test]
async fn test_fixed_retry_exhaustion_returns_underlying_error() {
    let (books, reviews) = sample_catalog();
    let infos = Arc::new(InMemoryBookInfoService::new(books).fail_first(u32::MAX));
    let service = BookService::from_shared(Arc::clone(&infos), Arc::new(InMemoryReviewService::new(reviews)));

    let err = assert_err!(service.get_books(&RetryPolicy::fixed(3)).await);

    assert!(matches!(err, BookError::Lookup { .. }));
    assert_eq!(infos.calls(), 4);
}

#[tokio::test]
async fn test_backoff_does_not_retry_other_error_kinds() {
    let infos = Arc::new(InMemoryBookInfoService::new(vec![book_info(1)]));
    // 評論指向別本書：完整性錯誤，不是查詢失敗
    let reviews = InMemoryReviewService::from_map(
        [(1, vec![review(1, 2, 4.0)])].into_iter().collect(),
    );
    let sleeper = TrackingSleeper::new();
    let service = BookService::from_shared(Arc::clone(&infos), Arc::new(reviews))
        .with_sleeper(Arc::new(sleeper.clone()));

    let err = assert_err!(
        service
            .get_books(&RetryPolicy::backoff(3, Duration::from_millis(100)))
            .await
    );

    assert!(matches!(err, BookError::Integrity { .. }));
    assert_eq!(infos.calls(), 1);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_backoff_exhaustion_wraps_final_lookup_failure() {
    let (infos, _) = shared_catalog();
    let (_, reviews) = sample_catalog();
    let reviews = Arc::new(InMemoryReviewService::new(reviews).fail_first(u32::MAX));
    let sleeper = TrackingSleeper::new();
    let observer = RecordingObserver::new();
    let service = BookService::from_shared(Arc::clone(&infos), reviews)
        .with_sleeper(Arc::new(sleeper.clone()))
        .with_observer(Arc::new(observer.clone()));

    let err = assert_err!(
        service
            .get_books(&RetryPolicy::backoff(3, Duration::from_millis(100)))
            .await
    );

    match err {
        BookError::RetriesExhausted { retries, last } => {
            assert_eq!(retries, 3);
            assert!(matches!(*last, BookError::Lookup { .. }));
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
    assert_eq!(infos.calls(), 4);
    assert_eq!(
        sleeper.delays(),
        vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(400)
        ]
    );
    assert_eq!(
        observer.retries(),
        vec![
            Event::Retry {
                attempt: 2,
                delay: Duration::from_millis(100)
            },
            Event::Retry {
                attempt: 3,
                delay: Duration::from_millis(200)
            },
            Event::Retry {
                attempt: 4,
                delay: Duration::from_millis(400)
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_backoff_with_real_timer() {
    let (books, reviews) = sample_catalog();
    let service = BookService::new(
        InMemoryBookInfoService::new(books).fail_first(2),
        InMemoryReviewService::new(reviews),
    );

    let start = tokio::time::Instant::now();
    let result = service
        .get_books(&RetryPolicy::backoff(3, Duration::from_secs(1)))
        .await;

    assert_eq!(assert_ok!(result).len(), 5);
    assert!(start.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_get_book_by_id_keeps_review_order() {
    let infos = InMemoryBookInfoService::new(vec![book_info(7)]);
    let reviews = InMemoryReviewService::new(vec![
        review(30, 7, 1.0),
        review(10, 7, 5.0),
        review(20, 7, 3.0),
    ])
    .with_latency(Duration::from_millis(50));
    let service = BookService::new(infos, reviews);

    let book = assert_ok!(service.get_book_by_id(7).await).unwrap();

    let ids: Vec<u64> = book.reviews.iter().map(|r| r.review_id).collect();
    assert_eq!(ids, vec![30, 10, 20]);
    assert_eq!(book.info, book_info(7));
    assert_eq!(book.average_rating(), Some(3.0));
}

#[tokio::test]
async fn test_dropping_stream_stops_collaborator_calls() {
    let (infos, reviews) = shared_catalog();
    let observer = RecordingObserver::new();
    let service = BookService::from_shared(Arc::clone(&infos), Arc::clone(&reviews))
        .with_concurrency(Some(1))
        .with_observer(Arc::new(observer.clone()));

    let mut stream = service.stream_books();
    let first = stream.next().await.unwrap();
    assert_ok!(first);

    let calls_at_cancel = reviews.calls();
    assert_eq!(calls_at_cancel, 1);
    drop(stream);

    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(reviews.calls(), calls_at_cancel);
    assert_eq!(infos.calls(), 1);
    assert!(!observer
        .events()
        .iter()
        .any(|e| matches!(e, Event::Complete(_))));
}

#[tokio::test]
async fn test_stream_reports_lifecycle_to_observer() {
    let (infos, reviews) = shared_catalog();
    let observer = RecordingObserver::new();
    let service = BookService::from_shared(infos, reviews).with_observer(Arc::new(observer.clone()));

    let books: Vec<_> = service.stream_books().collect().await;
    assert_eq!(books.len(), 5);

    let events = observer.events();
    assert_eq!(events.first(), Some(&Event::Subscribe));
    assert_eq!(events.last(), Some(&Event::Complete(5)));
    assert_eq!(
        events.iter().filter(|e| matches!(e, Event::Next(_))).count(),
        5
    );
}

#[tokio::test]
async fn test_stream_ends_after_translated_error() {
    let (books, reviews) = sample_catalog();
    let service = BookService::new(
        InMemoryBookInfoService::new(books),
        InMemoryReviewService::new(reviews).fail_first(1),
    )
    .with_concurrency(Some(1));

    let items: Vec<_> = service.stream_books().collect().await;

    assert_eq!(items.len(), 1);
    let err = items.into_iter().next().unwrap().unwrap_err();
    assert!(err.is_retryable());
    assert!(err.to_string().contains("Exception occurred while fetching books"));
}

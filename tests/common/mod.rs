#![allow(dead_code)]

use reactive_books::domain::ports::PipelineObserver;
use reactive_books::{Book, BookError, BookInfo, Review};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Subscribe,
    Next(u64),
    Error(String),
    Complete(usize),
    Retry { attempt: u32, delay: Duration },
}

#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn retries(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, Event::Retry { .. }))
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_subscribe(&self, _pipeline: &str) {
        self.push(Event::Subscribe);
    }

    fn on_next(&self, _pipeline: &str, book: &Book) {
        self.push(Event::Next(book.id()));
    }

    fn on_error(&self, _pipeline: &str, error: &BookError) {
        self.push(Event::Error(error.to_string()));
    }

    fn on_complete(&self, _pipeline: &str, emitted: usize) {
        self.push(Event::Complete(emitted));
    }

    fn on_retry(&self, _pipeline: &str, attempt: u32, delay: Duration, _error: &BookError) {
        self.push(Event::Retry { attempt, delay });
    }
}

pub fn book_info(id: u64) -> BookInfo {
    BookInfo {
        book_id: id,
        title: format!("Book {}", id),
        author: format!("Author {}", id),
        isbn: format!("978-{:06}", id),
    }
}

pub fn review(review_id: u64, book_id: u64, rating: f64) -> Review {
    Review {
        review_id,
        book_id,
        rating,
        comment: format!("Review {} of book {}", review_id, book_id),
    }
}

/// 五本書；第 5 本沒有評論
pub fn sample_catalog() -> (Vec<BookInfo>, Vec<Review>) {
    let books = (1..=5).map(book_info).collect();
    let reviews = vec![
        review(1, 1, 4.5),
        review(2, 1, 3.0),
        review(3, 2, 5.0),
        review(4, 3, 2.5),
        review(5, 3, 4.0),
        review(6, 3, 1.0),
        review(7, 4, 3.5),
    ];
    (books, reviews)
}

pub fn reviews_for(reviews: &[Review], book_id: u64) -> Vec<Review> {
    reviews
        .iter()
        .filter(|r| r.book_id == book_id)
        .cloned()
        .collect()
}

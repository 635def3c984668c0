pub mod book_service;
pub mod join;
pub mod retry;

pub use crate::domain::model::{Book, BookId, BookInfo, Review};
pub use crate::domain::ports::{BookInfoService, PipelineObserver, ReviewService};
pub use crate::utils::error::Result;

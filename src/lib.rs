pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use adapters::in_memory::{InMemoryBookInfoService, InMemoryReviewService};
pub use config::toml_config::AppConfig;
pub use crate::core::{
    book_service::BookService,
    join::JoinPipeline,
    retry::{BackoffSpec, RetryPolicy},
};
pub use domain::model::{Book, BookId, BookInfo, Review};
pub use utils::error::{BookError, Result, SourceError};
pub use utils::logger::TracingObserver;

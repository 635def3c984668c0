use crate::adapters::in_memory::{InMemoryBookInfoService, InMemoryReviewService};
use crate::core::retry::{BackoffSpec, RetryPolicy};
use crate::domain::model::{BookInfo, Review};
use crate::utils::error::{BookError, Result};
use crate::utils::logger::LogFormat;
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_unique, Validate,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

pub const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub catalog: CatalogConfig,
    pub simulation: Option<SimulationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum PolicyKind {
    #[default]
    None,
    Fixed,
    Backoff,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub policy: PolicyKind,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::None,
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub books: Vec<BookInfo>,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub latency_ms: Option<u64>,
    pub fail_first_lists: Option<u32>,
    pub fail_first_reviews: Option<u32>,
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BookError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| BookError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${REVIEW_LATENCY_MS})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| BookError::ConfigError {
            message: format!("Invalid placeholder pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = &self.retry;
        match retry.policy {
            PolicyKind::None => RetryPolicy::None,
            PolicyKind::Fixed => RetryPolicy::fixed(retry.max_retries),
            PolicyKind::Backoff => RetryPolicy::Backoff(
                BackoffSpec::new(retry.max_retries, Duration::from_millis(retry.base_delay_ms))
                    .with_max_delay(Duration::from_millis(retry.max_delay_ms)),
            ),
        }
    }

    pub fn concurrency(&self) -> Option<usize> {
        self.pipeline.concurrency
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    pub fn log_format(&self) -> LogFormat {
        self.logging.as_ref().map(|l| l.format).unwrap_or_default()
    }

    /// 依 catalog 與 simulation 建立記憶體版的兩個服務
    pub fn build_services(&self) -> (InMemoryBookInfoService, InMemoryReviewService) {
        let simulation = self.simulation.clone().unwrap_or_default();
        let latency = Duration::from_millis(simulation.latency_ms.unwrap_or(0));

        let infos = InMemoryBookInfoService::new(self.catalog.books.clone())
            .with_latency(latency)
            .fail_first(simulation.fail_first_lists.unwrap_or(0));
        let reviews = InMemoryReviewService::new(self.catalog.reviews.clone())
            .with_latency(latency)
            .fail_first(simulation.fail_first_reviews.unwrap_or(0));

        (infos, reviews)
    }

    /// 查詢書籍的指令需要非空的 `[catalog]`；demo 不需要
    pub fn require_catalog(&self) -> Result<()> {
        if self.catalog.books.is_empty() {
            return Err(BookError::MissingConfigError {
                field: "catalog.books".to_string(),
            });
        }
        Ok(())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("pipeline.name", &self.pipeline.name)?;

        if let Some(concurrency) = self.pipeline.concurrency {
            validate_positive_number("pipeline.concurrency", concurrency, 1)?;
        }

        validate_range("retry.max_retries", self.retry.max_retries, 0, MAX_RETRIES_LIMIT)?;
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(BookError::InvalidConfigValueError {
                field: "retry.base_delay_ms".to_string(),
                value: self.retry.base_delay_ms.to_string(),
                reason: format!(
                    "Must not exceed retry.max_delay_ms ({})",
                    self.retry.max_delay_ms
                ),
            });
        }

        validate_unique("catalog.books", self.catalog.books.iter().map(|b| b.book_id))?;
        validate_unique(
            "catalog.reviews",
            self.catalog.reviews.iter().map(|r| r.review_id),
        )?;

        let known: HashSet<u64> = self.catalog.books.iter().map(|b| b.book_id).collect();
        for review in &self.catalog.reviews {
            if !known.contains(&review.book_id) {
                return Err(BookError::InvalidConfigValueError {
                    field: "catalog.reviews".to_string(),
                    value: review.review_id.to_string(),
                    reason: format!("References unknown book {}", review.book_id),
                });
            }
            validate_range("catalog.reviews.rating", review.rating, 0.0, 5.0)?;
        }

        Ok(())
    }
}

impl Default for AppConfig {
    /// 內建的示範書目
    fn default() -> Self {
        let books = vec![
            BookInfo {
                book_id: 1,
                title: "Book One".to_string(),
                author: "Author One".to_string(),
                isbn: "12345678".to_string(),
            },
            BookInfo {
                book_id: 2,
                title: "Book Two".to_string(),
                author: "Author Two".to_string(),
                isbn: "23456789".to_string(),
            },
            BookInfo {
                book_id: 3,
                title: "Book Three".to_string(),
                author: "Author Three".to_string(),
                isbn: "34567890".to_string(),
            },
        ];
        let reviews = vec![
            Review {
                review_id: 1,
                book_id: 1,
                rating: 4.5,
                comment: "Good Book".to_string(),
            },
            Review {
                review_id: 2,
                book_id: 1,
                rating: 3.0,
                comment: "Not Bad".to_string(),
            },
            Review {
                review_id: 3,
                book_id: 2,
                rating: 5.0,
                comment: "Must read".to_string(),
            },
        ];

        Self {
            pipeline: PipelineConfig {
                name: "books".to_string(),
                concurrency: None,
            },
            retry: RetryConfig::default(),
            logging: None,
            catalog: CatalogConfig { books, reviews },
            simulation: None,
        }
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

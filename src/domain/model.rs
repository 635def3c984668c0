use serde::{Deserialize, Serialize};

pub type BookId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookInfo {
    pub book_id: BookId,
    pub title: String,
    pub author: String,
    pub isbn: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub review_id: u64,
    pub book_id: BookId,
    pub rating: f64,
    pub comment: String,
}

/// BookInfo 與其全部評論的組合，兩邊都解析完成後才建立
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub info: BookInfo,
    pub reviews: Vec<Review>,
}

impl Book {
    pub fn new(info: BookInfo, reviews: Vec<Review>) -> Self {
        Self { info, reviews }
    }

    pub fn id(&self) -> BookId {
        self.info.book_id
    }

    pub fn average_rating(&self) -> Option<f64> {
        if self.reviews.is_empty() {
            return None;
        }
        let total: f64 = self.reviews.iter().map(|r| r.rating).sum();
        Some(total / self.reviews.len() as f64)
    }
}

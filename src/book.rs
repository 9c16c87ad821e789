//! The bibliographic record cached under `book::<id>`.

use crate::entity::{AssignKey, CacheEntity};
use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A book as held by the record store.
///
/// `id` is `None` until the store assigns one on insert.
///
/// ```
/// use shelf_cache::Book;
///
/// let book = Book::new("Go in Action", "W. Kennedy").with_price(39.99);
/// assert_eq!(book.id, None);
/// assert_eq!(book.price, Some(39.99));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: Option<i64>,
    pub title: String,
    pub author: String,
    pub publisher: Option<String>,
    pub publish_date: Option<NaiveDate>,
    pub price: Option<f64>,
}

impl Book {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Book {
            id: None,
            title: title.into(),
            author: author.into(),
            publisher: None,
            publish_date: None,
            price: None,
        }
    }

    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }

    pub fn with_publish_date(mut self, date: NaiveDate) -> Self {
        self.publish_date = Some(date);
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }
}

impl CacheEntity for Book {
    type Key = i64;

    fn cache_key(&self) -> Option<Self::Key> {
        self.id
    }

    fn cache_prefix() -> &'static str {
        "book"
    }

    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::ValidationError("book title is empty".to_string()));
        }
        if let Some(price) = self.price {
            if !price.is_finite() || price < 0.0 {
                return Err(Error::ValidationError(format!(
                    "book price must be a non-negative amount, got {}",
                    price
                )));
            }
        }
        Ok(())
    }
}

impl AssignKey for Book {
    fn assign_key(&mut self, key: i64) {
        self.id = Some(key);
    }
}

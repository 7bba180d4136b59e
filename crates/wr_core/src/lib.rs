pub mod error;
pub mod models;
pub mod storage;

pub use error::Error;
pub use models::{Article, ARTICLE_HOST, DEFAULT_TOPIC};
pub use storage::ArticleStorage;

pub type Result<T> = std::result::Result<T, Error>;

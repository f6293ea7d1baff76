pub mod extract;
pub mod pool;

pub use extract::{ExtractedPage, HtmlExtractor, ScraperHtmlExtractor};
pub use pool::ParserWorkerPool;

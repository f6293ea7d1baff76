pub mod store;

pub use store::{save_content_to_file, ContentError};

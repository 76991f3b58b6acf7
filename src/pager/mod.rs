// Pager module - paginated cache for large command output

pub mod error;
pub mod store;
pub mod types;

pub use error::PagerError;
pub use store::{OutputPager, paginate};
pub use types::{PageView, PagedResponse, StoredResponse};

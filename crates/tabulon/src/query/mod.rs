pub mod builder;
pub mod page;
pub mod result;

pub use builder::{Builder, ResumePoint};
pub use page::{Edge, Page, PageInfo};
pub use result::{PageCursor, ResultSet};

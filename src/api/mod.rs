//! API response types and pagination utilities

pub mod pagination;
pub mod response;

pub use pagination::{PaginationMeta, PaginationParams};
pub use response::DataResponse;

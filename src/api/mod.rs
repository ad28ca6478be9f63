pub mod extract;
pub mod response;

pub use extract::ApiJson;
pub use response::{respond, ApiError, ApiResponse, FieldError};

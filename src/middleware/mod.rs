pub mod auth;
pub mod ip_allow;
pub mod response;

pub use auth::jwt_auth_middleware;
pub use ip_allow::ip_allow_middleware;
pub use response::{ApiResponse, ApiResult};

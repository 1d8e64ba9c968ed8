mod auth;
mod error_handler;
mod post;
mod rate_limit;

pub use auth::auth;
pub use error_handler::log_errors;
pub use post::{PostPermission, check_post_ownership, post_context};
pub use rate_limit::{client_key, rate_limit};

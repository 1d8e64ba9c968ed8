pub mod auth;
pub mod health;
pub mod post;
pub mod user;

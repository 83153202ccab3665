pub mod auth;
pub mod error_handling;
pub mod guards;
pub mod logging;

pub mod error;
pub mod logger;
pub mod monitor;
pub mod shell;
pub mod validation;

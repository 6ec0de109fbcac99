pub mod app;
pub mod data;
pub mod error;
pub mod utils;

pub use error::{ProctopoError, Result};

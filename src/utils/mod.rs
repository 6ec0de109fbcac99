mod format;

pub use format::{format_bytes, label_line, yes_no};

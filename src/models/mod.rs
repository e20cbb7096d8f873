pub mod document;
pub mod result;

pub use document::*;
pub use result::*;

pub mod result;
pub mod statement;

pub use result::*;
pub use statement::*;

//! Source extractors producing canonical invoice records

pub mod email;
pub mod erp;

pub use email::*;
pub use erp::*;

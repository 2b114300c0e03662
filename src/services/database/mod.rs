pub mod adapter;
pub mod postgresql;

pub use adapter::*;
pub use postgresql::*;

mod cache;
mod range;
mod scope;

pub(crate) use cache::*;
pub use range::*;
pub use scope::*;

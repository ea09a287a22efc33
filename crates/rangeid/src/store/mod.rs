#[cfg(feature = "file")]
mod file;
mod interface;
mod memory;
#[cfg(feature = "s3")]
mod s3;

#[cfg_attr(docsrs, doc(cfg(feature = "file")))]
#[cfg(feature = "file")]
pub use file::*;
pub use interface::*;
pub use memory::*;
#[cfg_attr(docsrs, doc(cfg(feature = "s3")))]
#[cfg(feature = "s3")]
pub use s3::*;

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
mod error;
mod generator;
mod mutex;
mod store;

pub use crate::config::*;
pub use crate::error::*;
pub use crate::generator::*;
pub use crate::store::*;

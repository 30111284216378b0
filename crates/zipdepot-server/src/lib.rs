#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;

pub mod handler;
pub mod middleware;
pub mod repack;
pub mod service;
pub mod storage;

pub use crate::error::{BoxedError, Error, ErrorKind, Result};

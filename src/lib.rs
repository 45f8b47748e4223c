#![forbid(unsafe_code)]

pub mod archive;
pub mod batch;
pub mod cli;
pub mod container;
pub mod cover;
pub mod epub;
pub mod export;
pub mod extract;
pub mod formats;
pub mod logging;
pub mod normalize;
pub mod placeholder;
pub mod report;
pub mod scan;
pub mod session;
pub mod source;
pub mod toc;

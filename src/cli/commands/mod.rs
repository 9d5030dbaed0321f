//! Command implementations

pub mod check;
pub mod completions;
pub mod decide;
pub mod export;
pub mod init;
pub mod request;
pub mod team;
pub mod timeline;

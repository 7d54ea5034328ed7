#![forbid(unsafe_code)]

pub mod auth;
pub mod config;
pub mod icons;
pub mod mount;
pub mod panes;
pub mod profile;
pub mod transport;
pub mod tree;
pub mod vfs;
pub mod workspace;

#[cfg(test)]
mod testing;

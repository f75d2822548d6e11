//! Route handlers module.

pub mod activity;
pub mod config;
pub mod folders;
pub mod health;
pub mod refresh;
pub mod tree;

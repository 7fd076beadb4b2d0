pub mod app;
pub mod audio;
pub mod capture;
pub mod cli;
pub mod config;
pub mod global;
pub mod keys;
pub mod overlay;
pub mod session;
pub mod slides;
pub mod timer;

// Library exports for logcap

pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod gate;
pub mod logs;
pub mod service;

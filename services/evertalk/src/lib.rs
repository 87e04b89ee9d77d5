pub mod app;
pub mod capture;
pub mod command;
pub mod config;

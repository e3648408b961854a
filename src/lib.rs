pub mod app;
pub mod config;
pub mod db;
pub mod logging;
pub mod pb;
pub mod server;

pub mod archive;
pub mod config;
pub mod crawler;
pub mod domain;
pub mod error;
pub mod extract;
pub mod geo;
pub mod miniml;
pub mod output;
pub mod progress;
pub mod sink;

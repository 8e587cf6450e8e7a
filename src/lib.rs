pub mod analysis;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod dates;
pub mod error;
pub mod sink;
pub mod state;
pub mod status_poller;
pub mod types;

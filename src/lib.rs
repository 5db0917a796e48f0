// Library for tests to access modules

pub mod config;
pub mod device_client;
pub mod error;
pub mod guide_cache;
pub mod history_cache;
pub mod hub;
pub mod inverter;
pub mod models;
pub mod poller;
pub mod routes;
pub mod window_cache;
pub mod worker;

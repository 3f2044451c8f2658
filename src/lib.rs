pub mod amnezia;
pub mod cli;
pub mod config;
pub mod config_file;
pub mod database;
pub mod domain;
pub mod error;
pub mod event_bus;
pub mod filesystem;
pub mod provisioning;
pub mod repository;

#[cfg(test)]
mod testing;

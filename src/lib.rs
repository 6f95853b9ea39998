pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod lineage;
pub mod model;
pub mod output;
pub mod release;
pub mod seed;
pub mod service;
pub mod store;

pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod response_store;
pub mod sensors;
pub mod yolink;

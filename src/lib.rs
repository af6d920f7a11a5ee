pub mod client;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod detail;
pub mod error;
pub mod middleware;
pub mod models;
pub mod product_form;
pub mod routes;
pub mod session;
pub mod state;
pub mod storage;
pub mod store;

#[cfg(test)]
mod testing;

#![cfg(not(doctest))]

pub mod db;
pub mod graph;
pub mod models;
pub mod request_io;
pub mod schema;
pub mod token;
pub mod validators;

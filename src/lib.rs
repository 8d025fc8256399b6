use std::error::Error;

pub mod api;
pub mod bookmarks;
pub mod config;
pub mod crawler;
pub mod db;
pub mod error;
pub mod handler;
pub mod import;
pub mod middleware;
pub mod model;
pub mod queue;
pub mod routes;
pub mod store;

pub fn unpack_error(err: &(dyn Error)) -> String {
    let mut parts = Vec::new();
    parts.push(err.to_string());
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}

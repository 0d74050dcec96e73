//! Push board server library.
//!
//! Keeps a live, filtered and grouped view of the pushes and jobs of one CI
//! repository, with URL-backed selection, and serves it over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;

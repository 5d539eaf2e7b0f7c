// src/lib.rs

//! pagewatch: web page change monitoring with webhook notifications.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

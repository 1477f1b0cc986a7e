// src/handlers.rs

pub mod catalog;
pub mod sync;

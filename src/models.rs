// src/models.rs

pub mod catalog;
pub mod sync;

// src/services/mod.rs

pub mod attempt;
pub mod catalog;
pub mod grading;
pub mod selector;

// src/models/mod.rs

pub mod question;
pub mod quiz;
pub mod session;
pub mod submission;
pub mod user;

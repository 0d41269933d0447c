// src/handlers/mod.rs

pub mod auth;
pub mod health;
pub mod questions;
pub mod quizzes;
pub mod submissions;
pub mod users;

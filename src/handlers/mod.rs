// src/handlers/mod.rs

pub mod auth;
pub mod participant;
pub mod pools;
pub mod questions;
pub mod sessions;
pub mod templates;

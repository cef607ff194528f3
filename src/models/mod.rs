// src/models/mod.rs

pub mod examiner;
pub mod participant;
pub mod pool;
pub mod question;
pub mod session;
pub mod template;

// src/engine/mod.rs
//
// Pure test-assembly logic: drawing, scoring, access codes and the
// participant lifecycle. Nothing in here touches the store.

pub mod access_code;
pub mod draw;
pub mod filter;
pub mod lifecycle;
pub mod report;
pub mod scoring;

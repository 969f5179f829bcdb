// src/notify/mod.rs
//! Delivery layer: the digest leaves the process here and nowhere else.

pub mod email;

pub use email::EmailSender;

//! Command handlers

pub mod config;
pub mod notification;
pub mod question;
pub mod stats;
pub mod tag;
pub mod user;

/// State management module
///
/// This module handles all application state, including:
/// - Shared data structures (data.rs)
/// - The per-run Session and its lock (session.rs)
/// - Slot and output directories on disk (storage.rs)
/// - The catalog of produced try-on images (history.rs)

pub mod data;
pub mod history;
pub mod session;
pub mod storage;

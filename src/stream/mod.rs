//! Streaming search progress.
//!
//! This module provides types for consuming a search as an async stream.
//!
//! # Overview
//!
//! - [`SearchEvent`] - A progress report or the final best move
//! - [`SearchStream`] - An async stream of events from one search
//! - [`CollectedSearch`] - A convenience type for collecting a whole search
//!
//! Events are produced by the supervisor while the search is at the head of
//! the request queue. If the search times out the final event carries the
//! fallback move with `timed_out` set; if the engine crashes the stream ends
//! with the crash error.

pub mod events;
pub mod search;

pub use events::SearchEvent;
pub use search::{CollectedSearch, SearchStream};

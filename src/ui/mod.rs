//! Interaction layer. Only the web front-end exists.

pub mod web;

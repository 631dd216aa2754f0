//! Shared paths and client plumbing for the audio-research daemon and its tools.

pub mod client;
pub mod dirs;

//! Pipeline stages for score-to-PDF generation.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and swapped (another transport, another PDF backend) without touching
//! the others.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ acquire ──▶ assemble
//! (bytes)   (bitmap /    (pdf-writer)
//!            SVG tree)
//! ```
//!
//! 1. [`fetch`]    — [`fetch::PageLoader`] seam; HTTP(S) or local files
//! 2. [`acquire`]  — timeout + retry around the fetch, then decode in
//!    `spawn_blocking`
//! 3. [`assemble`] — embed each page as one full-page XObject, serialise

pub mod acquire;
pub mod assemble;
pub mod fetch;

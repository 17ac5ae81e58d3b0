//! Shared foundational types used across the stabil change-impact engine.
//!
//! This crate provides the two hash types everything else is keyed on: the
//! 32-bit [`Checksum`] identifying one block of source text, and the 128-bit
//! [`ContentHash`] identifying the full content of a tracked file.

#![warn(missing_docs)]

pub mod checksum;
pub mod fingerprint;
pub mod hash;

pub use checksum::Checksum;
pub use fingerprint::{Delta, FileFingerprint};
pub use hash::ContentHash;

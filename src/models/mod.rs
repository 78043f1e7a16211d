//! Core data models shared by every object-store backend.
//!
//! These describe objects as seen through listings, the shape of a listing
//! query and its result, and the write-time options a backend may honour
//! or ignore.

pub mod acl;
pub mod listing;
pub mod object;

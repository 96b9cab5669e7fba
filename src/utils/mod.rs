//! Utility Module
//!
//! - [`interner`]: String interning for curve names and property paths
//! - [`time`]: Monotonic frame clock
//!
//! # String Interning
//!
//! ```rust,ignore
//! use myth_animation::utils::interner;
//!
//! let sym1 = interner::intern("walk");
//! let sym2 = interner::intern("walk");
//! assert_eq!(sym1, sym2); // O(1) comparison
//! ```

pub mod interner;
pub mod time;

pub use interner::Symbol;
pub use time::FrameClock;

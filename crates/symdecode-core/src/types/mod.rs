//! # Types
//!
//! Small value types shared by the decoder layer and its backends.

pub mod address;
pub mod symbols;

// Re-export all public types
pub use address::Address;
pub use symbols::SymbolLanguage;

//! # Symbols
//!
//! The building blocks platform backends decode with:
//!
//! - [`modules`]: which files are mapped where in this process
//! - [`image`]: function symbols and DWARF sections of one file
//! - [`lines`]: a lock-free address-to-line table built from DWARF
//! - [`demangle`]: Rust and C++ demangling into caller buffers

pub mod demangle;
pub mod image;
pub mod lines;
pub mod modules;

pub use image::SymbolImage;
pub use lines::LineTable;
pub use modules::{ModuleDescriptor, ModuleMap};

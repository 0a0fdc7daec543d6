mod exports;
pub use exports::*;

pub mod algorithms;
pub mod cost;
pub mod dataset;
pub mod error;
pub mod fixel;
pub mod grid;
pub mod io;
pub mod mapping;
pub mod matcher;
pub mod projector;
pub mod utils;

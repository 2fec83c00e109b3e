pub mod registers;

pub use registers::{DisplaySink, MappedRegisters, NullDisplay};

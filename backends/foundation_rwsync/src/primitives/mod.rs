//! Blocking primitives backing the shared counter.

pub mod gate;

pub use gate::WriterGate;

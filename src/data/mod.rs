//! This module contains generic data structures used by the selection
//! strategies.

pub mod discrete_pdf;

pub use discrete_pdf::DiscretePDF;

//! CLI command implementations.

pub mod bibliography;
pub mod build;
pub mod verify;

pub use bibliography::print_bibliography;
pub use build::build_site;
pub use verify::verify_site;

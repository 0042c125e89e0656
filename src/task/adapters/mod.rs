//! Adapter implementations for the spec catalog port.

pub mod memory;
pub mod overlay;

pub use memory::InMemorySpecRepository;
pub use overlay::StateOverlayRepository;

//! Routing service.

mod router;

pub use router::{RoutingError, RoutingResult, TaskRouter};

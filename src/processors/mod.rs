//! Processor implementations.
//!
//! - [`DirectProcessor`] runs every task at once, each with its own retry loop
//! - [`SequentialProcessor`] one attempt at a time, fresh and retry queues alternating
//! - [`RouterProcessor`] dispatches on a kind prefix to child processors
//! - [`RouterProxy`] re-adds a fixed prefix in front of a router
//! - [`LoggedProcessor`] tracing decorator for any of the above

mod direct;
mod logged;
mod proxy;
mod router;
mod sequential;

pub use direct::DirectProcessor;
pub use logged::LoggedProcessor;
pub use proxy::RouterProxy;
pub use router::{RouterBuilder, RouterProcessor};
pub use sequential::SequentialProcessor;

//! Testing infrastructure: a synthetic host and event source.
//!
//! The engine only ever sees a host through [`RuntimeHost`](crate::host::RuntimeHost)
//! and [`EventSource`](crate::host::EventSource). These in-memory versions let
//! tests drive sessions deterministically, including hosts that fail or panic.
//!
//! ```rust,ignore
//! use impactcov::testkit::{SyntheticEventSource, SyntheticHost};
//!
//! let host = Arc::new(SyntheticHost::builder()
//!     .with_class("Invoice", "/app/models/invoice.rb", &[])
//!     .build());
//! let source = Arc::new(SyntheticEventSource::new());
//! let runtime = CoverageRuntime::builder(host.clone())
//!     .event_source(source.clone())
//!     .build();
//!
//! source.allocate(Some(host.class_handle("Invoice")));
//! ```

mod events;
mod host;

pub use events::{SyntheticEntry, SyntheticEventSource};
pub use host::{SyntheticHost, SyntheticHostBuilder};

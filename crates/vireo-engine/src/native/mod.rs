//! Native resource lifecycle.
//!
//! Objects that own natively-allocated resources are [`HybridObject`]s. The
//! [`NativeRegistry`] keeps a weak record per attached pointer; when an object's
//! last handle drops, its key is queued and the [`Sweeper`] later runs the
//! cleanup callbacks and frees the pointer, exactly once.
//!
//! Callbacks that touch GPU state are routed to the graphics thread through a
//! [`GraphicsExecutor`] bound with [`NativeRegistry::bind_graphics`].

mod cleanup;
mod object;
mod registry;
mod sweeper;

pub use cleanup::{CleanupAffinity, CleanupCallback, FinalizeBatch, NativeDeleter};
pub use object::{HybridObject, NativePtr};
pub use registry::{NativeRegistry, TrackingKey, TrackingRef};
pub use sweeper::{GraphicsExecutor, Sweeper};

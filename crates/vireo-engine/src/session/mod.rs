//! Surface session state machine.
//!
//! ```text
//! Uninitialized ──initialize──▶ SessionActive ──bind──▶ SurfaceBound ◀─┐
//!                                ▲      │                   │  └─rebind─┘
//!                              resume  pause              pause
//!                                │      ▼                   │
//!                                └── Paused ◀───────────────┘
//!
//! any ──destroy──▶ Destroyed ──reset──▶ Uninitialized
//! ```

mod controller;
mod state;

pub use controller::SessionController;
pub use state::{SessionState, SessionStatus};

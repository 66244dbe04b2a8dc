//! Application layer for the host.
//!
//! # Sub-modules
//!
//! - **`keyboard_service`** – The surface user logic talks to: latches,
//!   interceptions, key state queries, synthesis and the hook lifecycle.
//!   Contains no OS calls; the hook sits behind the `InterceptionHook` trait
//!   and synthesis behind the core's injector/layout traits.
//!
//! - **`bindings`** – Declarative user logic from the config file, validated
//!   and compiled into `KeyboardService` handlers.

pub mod bindings;
pub mod keyboard_service;

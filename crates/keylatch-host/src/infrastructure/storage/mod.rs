//! Storage infrastructure: reading the configuration file.
//!
//! keylatch never writes its config; the file is edited by hand and read
//! once at startup.  When it does not exist, defaults apply.

pub mod config;

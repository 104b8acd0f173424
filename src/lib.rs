pub mod archive;
pub mod compat;
pub mod config;
pub mod install;
pub mod layout;
pub mod logging;
pub mod manifest;
pub mod reconcile;
pub mod registry;

//! Service layer module.
//!
//! This module provides the service container and initialization logic
//! for all application services.

pub mod container;

pub use container::{ALL_ROOMS_HEADER, Components, NO_ROOMS_MESSAGE, ServiceContainer};

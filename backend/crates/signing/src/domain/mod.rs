//! Domain Layer - Business logic and entities
//!
//! This layer contains:
//! - Domain entities (Identity, SigningOutcome, StampPayload)
//! - Domain value objects (CompositeHash, ProviderStatus, ControlCode)
//! - Domain services (composite hash binding)
//! - Backend traits (interfaces)

pub mod backend;
pub mod entities;
pub mod services;
pub mod value_objects;

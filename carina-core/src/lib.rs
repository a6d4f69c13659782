//! Carina Core
//!
//! Core library for an infrastructure management tool that treats side effects as values:
//! resource model, schemas, the differ, plans and their interpreter, plus the
//! retry and wait primitives providers build their API calls on.

pub mod differ;
pub mod effect;
pub mod interpreter;
pub mod plan;
pub mod provider;
pub mod resolver;
pub mod resource;
pub mod retry;
pub mod schema;
pub mod wait;

//! SQLite storage for the Warble relay server.
//!
//! Provides persistence for visitor-keyed users and their personas.

mod db;
mod models;
mod queries;

#[cfg(test)]
mod tests;

pub use db::{DatabaseError, PersonaStore, unix_timestamp};
pub use models::{Persona, User};

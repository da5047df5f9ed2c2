//! Credential store adapters.
//!
//! The port (`UserStore`) lives in `gatehouse-auth`; a database-backed
//! adapter would sit next to the in-memory one.

pub mod in_memory;

pub use in_memory::InMemoryUserStore;

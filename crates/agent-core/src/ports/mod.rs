//! # Ports Layer
//!
//! ## Hexagonal Architecture
//!
//! - `inbound.rs` - Driving ports (the controller contract the dispatcher drives)
//! - `outbound.rs` - Driven ports (store, resolver, gateway)

pub mod inbound;
pub mod outbound;

//! SNMPv2c transport: a BER codec and a UDP GET client.

pub mod ber;
mod client;

pub use client::SnmpSource;

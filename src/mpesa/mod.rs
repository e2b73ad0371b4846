pub mod client;

pub use client::{MpesaClient, MpesaError, StkAccepted};

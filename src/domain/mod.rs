//! Domain types and the pure decision logic of the tracker.

pub mod chat;
pub mod duplicates;
pub mod extraction;
pub mod files;
pub mod invoices;
pub mod jobs;

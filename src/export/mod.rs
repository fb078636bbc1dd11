//! Recording export
//!
//! Flattens a decoded recording into formats offline tooling can consume.
//! Currently CSV only: one row per frame, with the per-thread load table
//! widened into `thread_i_load`/`thread_i_cycles` columns.

pub mod csv;

pub use csv::export_csv;

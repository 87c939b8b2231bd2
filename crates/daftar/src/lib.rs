//! daftar CLI: command implementations and report writers.
//!
//! The `daftar` binary is a thin wrapper over this crate:
//!
//! - `daftar generate`: run the engine and write the CSV reports
//! - `daftar validate`: regenerate and run the validator battery
//!
//! # Example Usage
//!
//! ```bash
//! daftar generate --products products.csv --customers customers.csv \
//!     --holidays holidays.csv --targets targets.json --out reports/
//! daftar validate --products products.csv --targets targets.json
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cmd;
pub mod report;

//! Converter host for Codex.
//!
//! A format plugs in by implementing [`Converter`]. The [`Host`] runs the
//! seven protocol commands against it and enforces the rules every format
//! shares.
//!
//! # Key Types
//!
//! - [`Converter`] -- one native format: detect, extract, synthesize
//! - [`Host`] -- executes [`Command`](codex_protocol::Command)s, serves stdio
//! - [`EngineConfig`] -- raw embedding limits and output options (TOML)
//! - [`ConverterRegistry`] -- lookup by format id
//! - [`RoundTripReport`] -- byte comparison of a source and its re-emission
//!
//! # Loss Rules
//!
//! - `L0` is only ever produced by replaying embedded raw bytes.
//! - Declared ceilings downgrade reports; nothing upgrades them.
//! - `lost_elements` is empty exactly when a report is `L0`.
//! - Outputs are committed by atomic rename; detect never writes.

pub mod atomic;
pub mod config;
pub mod converter;
pub mod error;
pub mod fallback;
pub mod host;
pub mod ir_io;
pub mod registry;
pub mod roundtrip;

pub use atomic::write_atomic;
pub use config::{EngineConfig, CONFIG_ENV};
pub use converter::{
    extension_of, file_stem, reject_non_file, Capabilities, Converter, Extraction, Source,
    Synthesis,
};
pub use error::{EngineError, EngineResult};
pub use host::{CommandOutput, Host};
pub use ir_io::{read_corpus, write_corpus, IR_SUFFIX};
pub use registry::ConverterRegistry;
pub use roundtrip::{round_trip_file, verify_round_trip, RoundTripOutcome, RoundTripReport};

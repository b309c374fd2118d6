#![warn(missing_docs)]
//! # spamguard-contract-tests
//!
//! Loads the frozen wire contracts under `contracts/` at the workspace root.
//! The tests in this crate validate fixtures against them and decode the same
//! fixtures into the client's typed responses.

use std::fs;
use std::path::PathBuf;

use jsonschema::JSONSchema;
use serde_json::Value;
use thiserror::Error;

/// Absolute path of a file under `contracts/`.
pub fn contract_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../contracts")
        .join(relative)
}

/// Reads and parses one JSON file under `contracts/`.
///
/// # Errors
/// Returns [`ContractError`] when the file is missing or not JSON.
pub fn load_json(relative: &str) -> Result<Value, ContractError> {
    let path = contract_path(relative);
    let raw = fs::read_to_string(&path).map_err(|source| ContractError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ContractError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Compiles the schema named `<name>.schema.json`.
///
/// # Errors
/// Returns [`ContractError`] when the schema cannot be read or compiled.
pub fn compile_schema(name: &str) -> Result<JSONSchema, ContractError> {
    let schema = load_json(&format!("{name}.schema.json"))?;
    JSONSchema::compile(&schema).map_err(|error| ContractError::Schema {
        name: name.to_string(),
        reason: error.to_string(),
    })
}

/// Loads `fixtures/<name>.<variant>.json`.
///
/// # Errors
/// Same as [`load_json`].
pub fn load_fixture(name: &str, variant: &str) -> Result<Value, ContractError> {
    load_json(&format!("fixtures/{name}.{variant}.json"))
}

/// Contract loading failures.
#[derive(Debug, Error)]
pub enum ContractError {
    /// File could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Offending path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// File is not valid JSON.
    #[error("invalid json in {path}: {source}")]
    Parse {
        /// Offending path.
        path: String,
        /// Underlying parse error.
        source: serde_json::Error,
    },
    /// Schema failed to compile.
    #[error("schema {name} does not compile: {reason}")]
    Schema {
        /// Schema name.
        name: String,
        /// Compiler message.
        reason: String,
    },
}

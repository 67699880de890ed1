//! Contract interface loading and operation descriptors
//!
//! The interface file is a JSON object carrying the contract ABI and its
//! deployable bytecode:
//!
//! ```json
//! { "abi": [ ... ], "bytecode": "0x6080..." }
//! ```
//!
//! `bytecode` may also be given as `{ "object": "0x6080..." }`.

use crate::config::OperationNames;
use crate::error::{ConsoleError, ConsoleResult};

use ethers::abi::{Abi, Function, ParamType, StateMutability};
use ethers::types::{Address, Bytes};
use serde::Deserialize;
use std::path::Path;

/// Mutability class of a callable contract operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    ReadOnly,
    StateChanging,
    Payable,
}

impl Mutability {
    fn from_abi(state: &StateMutability) -> Self {
        match state {
            StateMutability::Pure | StateMutability::View => Mutability::ReadOnly,
            StateMutability::NonPayable => Mutability::StateChanging,
            StateMutability::Payable => Mutability::Payable,
        }
    }

    pub fn changes_state(&self) -> bool {
        !matches!(self, Mutability::ReadOnly)
    }
}

/// A callable operation as described by the interface
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    pub name: String,
    pub inputs: Vec<ParamType>,
    pub outputs: Vec<ParamType>,
    pub mutability: Mutability,
}

impl From<&Function> for OperationDescriptor {
    fn from(function: &Function) -> Self {
        Self {
            name: function.name.clone(),
            inputs: function.inputs.iter().map(|p| p.kind.clone()).collect(),
            outputs: function.outputs.iter().map(|p| p.kind.clone()).collect(),
            mutability: Mutability::from_abi(&function.state_mutability),
        }
    }
}

#[derive(Deserialize)]
struct RawInterface {
    abi: Option<serde_json::Value>,
    bytecode: Option<RawBytecode>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Plain(String),
    Object { object: String },
}

/// Parsed interface file
#[derive(Debug, Clone)]
pub struct ContractInterface {
    pub abi: Abi,
    pub bytecode: Bytes,
}

impl ContractInterface {
    /// Load and validate an interface file
    pub fn load(path: &Path) -> ConsoleResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConsoleError::Config(format!("Failed to read interface file {:?}: {}", path, e))
        })?;
        Self::parse(&raw)
    }

    pub fn parse(input: &str) -> ConsoleResult<Self> {
        let raw: RawInterface = serde_json::from_str(input)
            .map_err(|e| ConsoleError::Config(format!("Interface file is not valid JSON: {}", e)))?;

        let abi_value = raw
            .abi
            .ok_or_else(|| ConsoleError::Config("Interface file has no `abi` field".to_string()))?;
        match abi_value.as_array() {
            Some(entries) if !entries.is_empty() => {}
            _ => {
                return Err(ConsoleError::Config(
                    "Interface `abi` must be a non-empty list of operations".to_string(),
                ))
            }
        }
        let abi: Abi = serde_json::from_value(abi_value)
            .map_err(|e| ConsoleError::Config(format!("Malformed ABI: {}", e)))?;
        if abi.functions().next().is_none() {
            return Err(ConsoleError::Config(
                "Interface `abi` declares no callable functions".to_string(),
            ));
        }

        let bytecode = match raw.bytecode {
            Some(RawBytecode::Plain(code)) | Some(RawBytecode::Object { object: code }) => {
                decode_bytecode(&code)?
            }
            None => {
                return Err(ConsoleError::Config(
                    "Interface file has no `bytecode` field".to_string(),
                ))
            }
        };

        Ok(Self { abi, bytecode })
    }

    /// Look up a function by name
    pub fn operation(&self, name: &str) -> Option<OperationDescriptor> {
        self.abi
            .functions_by_name(name)
            .ok()
            .and_then(|overloads| overloads.first())
            .map(OperationDescriptor::from)
    }

    pub fn operations(&self) -> Vec<OperationDescriptor> {
        self.abi.functions().map(OperationDescriptor::from).collect()
    }

    /// Check that every configured operation exists and can be invoked the way
    /// the console invokes it: with no arguments, and with a usable mutability
    /// class
    pub fn check_operations(&self, names: &OperationNames) -> ConsoleResult<()> {
        for name in [&names.activate, &names.deactivate, &names.withdraw] {
            let descriptor = self.argumentless_operation(name)?;
            if !descriptor.mutability.changes_state() {
                return Err(ConsoleError::Config(format!(
                    "Operation `{}` is read-only and cannot be submitted",
                    name
                )));
            }
        }

        if let Some(name) = &names.balance {
            let descriptor = self.argumentless_operation(name)?;
            if descriptor.mutability != Mutability::ReadOnly {
                return Err(ConsoleError::Config(format!(
                    "Balance operation `{}` must be read-only",
                    name
                )));
            }
            if !matches!(descriptor.outputs.first(), Some(ParamType::Uint(_))) {
                return Err(ConsoleError::Config(format!(
                    "Balance operation `{}` must return an unsigned integer first",
                    name
                )));
            }
        }

        Ok(())
    }

    fn argumentless_operation(&self, name: &str) -> ConsoleResult<OperationDescriptor> {
        let descriptor = self.operation(name).ok_or_else(|| {
            ConsoleError::Config(format!("Interface has no operation named `{}`", name))
        })?;
        if !descriptor.inputs.is_empty() {
            return Err(ConsoleError::Config(format!(
                "Operation `{}` takes {} argument(s), the console calls it with none",
                name,
                descriptor.inputs.len()
            )));
        }
        Ok(descriptor)
    }
}

fn decode_bytecode(code: &str) -> ConsoleResult<Bytes> {
    let hex_body = code.trim().strip_prefix("0x").ok_or_else(|| {
        ConsoleError::Config("Interface `bytecode` must be 0x-prefixed hex".to_string())
    })?;
    if hex_body.is_empty() {
        return Err(ConsoleError::Config("Interface `bytecode` is empty".to_string()));
    }
    let bytes = hex::decode(hex_body)
        .map_err(|e| ConsoleError::Config(format!("Interface `bytecode` is not hex: {}", e)))?;
    Ok(Bytes::from(bytes))
}

/// The deployed contract this console manages
#[derive(Debug, Clone)]
pub struct ContractReference {
    pub address: Address,
    pub interface: ContractInterface,
}

impl ContractReference {
    pub fn new(address: Address, interface: ContractInterface) -> Self {
        Self { address, interface }
    }

    pub fn function(&self, name: &str) -> ConsoleResult<&Function> {
        self.interface
            .abi
            .function(name)
            .map_err(|_| ConsoleError::Config(format!("Unknown contract operation `{}`", name)))
    }
}

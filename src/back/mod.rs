// ----------------------------
// File: src/back/mod.rs
// ----------------------------
//! Native-code backends. Each target implements `Assembly` over the
//! emitted program block; the driver picks one by target string.

pub mod arm64_macos;

use std::collections::HashMap;

use snafu::Snafu;

use crate::front::codegen::Instruction;
use crate::front::token::TokenKind;

#[derive(Debug, Snafu)]
pub enum BuildError {
    #[snafu(display("unsupported target architecture: {arch}"))]
    UnsupportedTarget { arch: String },

    #[snafu(display("failed to create build directory: {source}"))]
    Scratch { source: std::io::Error },

    #[snafu(display("failed to write assembly file: {source}"))]
    WriteAsm { source: std::io::Error },

    #[snafu(display("assembler failed: {detail}"))]
    Assemble { detail: String },

    #[snafu(display("linker failed: {detail}"))]
    Link { detail: String },

    #[snafu(display("failed to install executable: {source}"))]
    Install { source: std::io::Error },
}

pub trait Assembly {
    /// Lower the program block to assembly text.
    fn generate(&mut self) -> Result<(), BuildError>;

    /// The generated assembly, section by section.
    fn code(&self) -> String;

    /// Assemble and link the generated code into the output executable.
    fn build(&self) -> Result<(), BuildError>;
}

/// Select a backend for the given target string.
pub fn for_target(
    arch: &str,
    pb: &[Instruction],
    types: &HashMap<usize, TokenKind>,
    output: &str,
) -> Result<Box<dyn Assembly>, BuildError> {
    match arch {
        "arm64-macos" => Ok(Box::new(arm64_macos::Arm64Macos::new(pb, types, output))),
        _ => UnsupportedTargetSnafu { arch }.fail(),
    }
}

//! Core module tests
//!
//! Contains test suites for the compiler core:
//! - Parser and include string tests
//! - Expression and virtual modifier tests
//! - One suite per section compiler (keycodes, types, compat, symbols)
//! - Action resolution tests
//! - Include resolution and keymap assembly tests
//! - Merge properties and print/compile round trips

#[cfg(test)]
mod action_tests;
#[cfg(test)]
mod compiler_tests;
#[cfg(test)]
mod expr_tests;
#[cfg(test)]
mod keytypes_tests;
#[cfg(test)]
mod parser_tests;
#[cfg(test)]
mod symbols_tests;
#[cfg(test)]
mod vmod_tests;

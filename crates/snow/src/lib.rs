//! Scene generation and headless simulation routines for the `snow` binary.

pub mod scenes;

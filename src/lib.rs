//! Boundary element model setup: reads a subject's watershed surfaces,
//! optionally decimates them to an icosahedron grade, checks their topology and
//! writes the model to a FIF file.

pub mod bem;
pub mod cli;
pub mod config;
pub mod datatypes;
pub mod error;
pub mod fiff;
pub mod ico;
pub mod surface;
pub mod topology;

#![warn(clippy::all)]
//! Support for reading and writing point cloud files and processing reports.
//!
//! Point clouds can be read from and written to ASCII files with one point per line ([ascii]) and to ASCII
//! PLY files ([ply]). The [base] module picks the right format from the file extension. The [report] module
//! writes the results of the processing pipeline as plain text.

pub mod ascii;
pub mod base;
pub mod ply;
pub mod report;

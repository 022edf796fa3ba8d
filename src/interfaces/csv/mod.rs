//! Batch file formats of the `payroute` binary.

pub mod operation_reader;
pub mod request_writer;

pub mod account_writer;
pub mod operation_reader;
pub mod replay;

pub mod bai;
pub mod bed_writer;
pub mod cancel;
pub mod cli;
pub mod contigs;
pub mod driver;
pub mod error;
pub mod partition;
pub mod target;
pub mod vfo;
pub mod volume;

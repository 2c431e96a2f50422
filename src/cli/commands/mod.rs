//! Command implementations, one module per subcommand family.

pub mod audit;
pub mod export;
pub mod init;
pub mod status;
pub mod sync;

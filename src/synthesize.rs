pub mod arch;
pub mod launch;

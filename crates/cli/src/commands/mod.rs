pub mod downgrade;
pub mod init;
pub mod new;
pub mod status;
pub mod upgrade;

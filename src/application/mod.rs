pub mod backup;
pub mod bootstrap;
pub mod checksum;
pub mod validator;
pub mod wizard;

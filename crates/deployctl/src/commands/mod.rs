pub mod deploy;
pub mod environment;
pub mod servers;
pub mod sync_script;
pub mod undeploy;
pub mod validate;

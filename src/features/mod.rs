pub mod chat;
pub mod invocation;
pub mod personas;
pub mod rate_limiting;

pub mod access_log;
pub mod role_guard;

pub mod command_dispatcher;
pub mod notification_policy;
pub mod projection;
pub mod state_sink;

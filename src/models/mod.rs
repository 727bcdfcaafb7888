pub mod channel;
pub mod event;
pub mod timeline;

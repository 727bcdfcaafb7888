pub mod calendar_client;
pub mod ics;

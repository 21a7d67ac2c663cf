pub mod donors;
pub mod messages;
pub mod requests;
pub mod stats;

pub mod command;
pub mod error;
pub mod server;

// Re-export commonly used types
pub use command::{Command, ParseError, Response};
pub use error::ServerError;
pub use server::Server;

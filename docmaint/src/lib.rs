pub mod console;
pub mod error;
pub mod health;
pub mod session;
pub mod subsystems;

pub use console::Console;
pub use error::{QueryError, SessionError, ValidationError};
pub use session::{Session, SessionOptions};

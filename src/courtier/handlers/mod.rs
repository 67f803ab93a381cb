pub mod health;
pub use self::health::health;

pub mod quote;
pub use self::quote::{preflight, send_email};

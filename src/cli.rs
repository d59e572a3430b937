pub mod session;
pub mod setup;

pub use session::Session;

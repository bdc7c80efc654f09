pub mod messages;
pub mod config;
pub mod cookies;
pub mod error;
pub mod models;
pub mod signature;
pub mod utils;

pub use messages::*;
pub use config::*;
pub use error::*;
pub use models::session::*;
pub use utils::*;

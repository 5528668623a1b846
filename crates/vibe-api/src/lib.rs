pub mod error;
pub mod graph_handlers;
pub mod handlers;
pub mod reqlog;
pub mod repo_handlers;
pub mod routes;
pub mod server;
pub mod state;
pub mod stream_handlers;

pub use error::*;
pub use reqlog::RequestLog;
pub use routes::*;
pub use server::*;
pub use state::*;

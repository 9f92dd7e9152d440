pub mod client;
pub mod config;
pub mod handler;
pub mod knowledge_base;
pub mod models;
pub mod presign;
pub mod references;
pub mod server;

pub use config::AppConfig;
pub use handler::ChatHandler;
pub use server::run_server;

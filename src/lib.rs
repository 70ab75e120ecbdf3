pub mod app;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod persistence;
pub mod renderer;
pub mod sequencer;
pub mod session;
pub mod state;
pub mod storage;
pub mod store;
pub mod ui;

pub use app::router;
pub use config::{load_checkin, Config};
pub use state::AppState;
pub use storage::LocalStore;

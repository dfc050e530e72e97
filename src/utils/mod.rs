pub mod config;
pub mod fd_limit;
pub mod logger;
pub mod settings_file;

pub use config::*;
pub use fd_limit::{FDS_PER_WORKER, max_open_fds, max_workers_by_fd_limit, workers_for_fd_limit};
pub use logger::{load_dotenv, setup_logging};
pub use settings_file::{SettingsFile, apply_file_to_opts, load_settings_file, parse_settings};

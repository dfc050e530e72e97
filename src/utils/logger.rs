use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;
use std::path::Path;

/// Load `.env` from `dir` (if any) so a `RUST_LOG` set there applies to this run.
/// Variables already set in the environment win.
pub fn load_dotenv(dir: &Path) {
    let env_path = dir.join(".env");
    if env_path.is_file()
        && let Err(e) = dotenvy::from_path(&env_path)
    {
        eprintln!("ignoring {}: {}", env_path.display(), e);
    }
}

/// Dependencies log at Warn, this crate at Info (Debug when `verbose`). `RUST_LOG` still applies.
/// Safe to call more than once; later calls are no-ops.
pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let _ = Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter_module(env!("CARGO_PKG_NAME"), level)
        .parse_default_env()
        .format(|buf, record| {
            let name = env!("CARGO_PKG_NAME");
            let line = match record.level() {
                Level::Error | Level::Warn => {
                    let level_str = match record.level() {
                        Level::Warn => "WARN".yellow(),
                        _ => "ERROR".red(),
                    };
                    let thread = std::thread::current();
                    let origin = format!(
                        "{}@{}",
                        record.target(),
                        thread.name().unwrap_or("main")
                    )
                    .white();
                    format!("[{} {} {}] {}", name.cyan(), level_str, origin, record.args())
                }
                Level::Debug | Level::Trace => format!(
                    "[{} {}] {}",
                    name.cyan(),
                    record.level().as_str().dimmed(),
                    record.args()
                ),
                Level::Info => format!("[{}] {}", name.cyan(), record.args()),
            };
            writeln!(buf, "{}", line)
        })
        .try_init();
}

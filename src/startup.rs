//! Startup banner: version, config source, bound address.

use crate::config::{Config, VERSION};

mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GREEN: &str = "\x1b[32m";
    pub const MAGENTA: &str = "\x1b[35m";
}

pub fn print_startup(config: &Config) {
    use colors::*;

    println!();
    println!("  {BOLD}{CYAN}horde-broker{RESET} {DIM}v{VERSION}{RESET}");
    println!("  {DIM}Matching-and-accounting engine for distributed text generation{RESET}");
    println!();

    if let Some(path) = Config::config_path() {
        if path.exists() {
            println!("  {DIM}Config:{RESET} {GREEN}\u{2713}{RESET} {}", path.display());
        } else {
            println!("  {DIM}Config:{RESET} {DIM}(using defaults){RESET}");
        }
    }
    println!();

    println!("  {DIM}db_dir:{RESET} {}", config.db_dir.display());
    println!("  {DIM}allow_anonymous:{RESET} {}", config.allow_anonymous);
    println!(
        "  {DIM}snapshot_interval_secs:{RESET} {}",
        config.snapshot_interval_secs
    );
    println!();

    println!(
        "  {MAGENTA}\u{25b8}{RESET} API listening on {BOLD}{}{RESET}",
        config.bind_addr
    );
    println!();
}

pub fn log_startup(config: &Config) {
    tracing::info!("horde-broker v{} starting", VERSION);
    tracing::info!("db_dir = {}", config.db_dir.display());
    tracing::info!("allow_anonymous = {}", config.allow_anonymous);
    tracing::info!("listening on {}", config.bind_addr);
}

use coldstore_cli::application::{init_tracing, run_manage_disk};
use tracing::error;

fn main() {
    init_tracing();
    if let Err(e) = run_manage_disk() {
        error!("{e}");
        std::process::exit(e.exit_code());
    }
}

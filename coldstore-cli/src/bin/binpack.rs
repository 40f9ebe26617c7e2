use coldstore_cli::application::{init_tracing, run_binpack};
use tracing::error;

fn main() {
    init_tracing();
    if let Err(e) = run_binpack() {
        error!("{e}");
        std::process::exit(e.exit_code());
    }
}

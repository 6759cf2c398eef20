// src/main.rs

use diagrun::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(e) = logging::init_logging(args.log_level) {
        eprintln!("diagrun error: {e:?}");
        std::process::exit(1);
    }

    match run(args).await {
        Ok(report) => {
            // Per-job statuses are the real output; the process exit code
            // only says whether anything in the batch went wrong.
            if !report.all_succeeded() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("diagrun error: {e:?}");
            std::process::exit(1);
        }
    }
}

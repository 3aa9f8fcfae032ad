use chrono::Utc;
use clap::error::ErrorKind;
use clap::Parser;

use check_stackdriver::options::{Cli, OptionsError};
use check_stackdriver::{check, logging, run_check, safe_run, CheckError, ServiceState};

fn main() {
    let parsed = Cli::try_parse();
    if let Err(ref e) = parsed {
        if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
            e.exit();
        }
    }

    logging::init(parsed.as_ref().map(|cli| cli.verbose).unwrap_or(0));

    // Anything that keeps the check from running is UNKNOWN, not CRITICAL.
    safe_run(
        || -> Result<_, CheckError> {
            let options = parsed.map_err(OptionsError::from)?.into_options()?;
            let client = check::connect(&options)?;
            run_check(&options, &client, Utc::now())
        },
        ServiceState::Unknown,
    )
    .print_and_exit()
}

use clap::Parser;
use log::error;
use smart_loader::{LoaderError, Options, StderrLogger, run};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let options = match Options::try_parse() {
        Ok(options) => options,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            // Nothing left to report to if stderr itself is gone.
            let _ = e.print();
            return ExitCode::from(LoaderError::Usage(e).exit_code());
        }
    };

    if let Err(e) = StderrLogger::new(options.log_level).init() {
        eprintln!("Failed to install logger: {e}");
    }

    match run(&options) {
        Ok(outcome) => {
            print!("{outcome}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", chain(&e));
            ExitCode::from(e.exit_code())
        }
    }
}

/// `error: cause: root cause`
fn chain(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

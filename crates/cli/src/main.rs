use std::process::ExitCode;

fn main() -> ExitCode {
    facultag_cli::run()
}

use std::process::ExitCode;

fn main() -> ExitCode {
    pedrabotnik_cli::run()
}

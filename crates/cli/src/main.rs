use std::process::ExitCode;

fn main() -> ExitCode {
    parapheur_cli::run()
}

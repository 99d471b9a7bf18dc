use std::process::ExitCode;

fn main() -> ExitCode {
    match capgains::cmd::command_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(()) => ExitCode::FAILURE,
    }
}

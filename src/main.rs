use std::process::ExitCode;

mod app;
mod logging;

fn main() -> ExitCode {
    let args = audio_dedupe::cli::parse();
    match app::run(args) {
        Ok(code) => code,
        Err(e) => {
            audio_dedupe::output::print_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

use std::io::{self, Write};
use std::process::ExitCode;

use gradprobe_smoke::{SmokeConfig, run};

fn main() -> ExitCode {
    env_logger::init();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = SmokeConfig::from_env().and_then(|config| run(&config, &mut out));
    let _ = out.flush();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

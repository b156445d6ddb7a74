//! validate_outputs - check a restyle output directory

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use room_restyle::validate::validate_outputs;

#[derive(Parser, Debug)]
#[command(name = "validate_outputs", about = "Validate restyle pipeline outputs")]
struct Args {
    /// Run output directory
    #[arg(default_value = "outputs/integration_test")]
    output_dir: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let problems = validate_outputs(&args.output_dir);
    if problems.is_empty() {
        println!("VALIDATION: PASS");
        return ExitCode::SUCCESS;
    }
    println!("VALIDATION: FAIL");
    for problem in &problems {
        println!("  - {}", problem);
    }
    ExitCode::FAILURE
}

use std::collections::HashMap;
use std::io::Read;

use bashlet::bash::{Bash, BashOptions};
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "bashlet")]
#[command(about = "Run bash scripts in an in-process shell with a virtual filesystem")]
#[command(version)]
struct Cli {
    /// Execute the script from command line argument
    #[arg(short = 'c')]
    script: Option<String>,

    /// Exit immediately if a command exits with non-zero status
    #[arg(short = 'e', long = "errexit")]
    errexit: bool,

    /// Working directory within the virtual filesystem
    #[arg(long = "cwd")]
    cwd: Option<String>,

    /// Output results as JSON (stdout, stderr, exitCode)
    #[arg(long = "json")]
    json: bool,

    /// Exported variable for the script, NAME=VALUE (repeatable)
    #[arg(long = "env", value_name = "NAME=VALUE", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// Script file to execute
    #[arg()]
    script_file: Option<String>,
}

fn parse_env_pair(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{}'", arg)),
    }
}

fn read_script(cli: &Cli) -> Result<String, String> {
    if let Some(s) = &cli.script {
        return Ok(s.clone());
    }
    if let Some(file) = &cli.script_file {
        return std::fs::read_to_string(file).map_err(|e| format!("Cannot read script file: {}: {}", file, e));
    }
    use std::io::IsTerminal;
    if std::io::stdin().is_terminal() {
        return Err("No script provided. Use -c 'script', provide a script file, or pipe via stdin.".to_string());
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| format!("Cannot read stdin: {}", e))?;
    Ok(buf)
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so script output on stdout stays clean
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let script = match read_script(&cli) {
        Ok(script) => script,
        Err(message) => {
            eprintln!("Error: {}", message);
            std::process::exit(1);
        }
    };

    let env: HashMap<String, String> = cli.env.into_iter().collect();
    let mut bash = Bash::new(BashOptions {
        cwd: cli.cwd,
        env: (!env.is_empty()).then_some(env),
        ..Default::default()
    })
    .await;

    // Prepend set -e if errexit
    let final_script = if cli.errexit {
        format!("set -e\n{}", script)
    } else {
        script
    };

    let result = bash.exec(&final_script).await;

    if cli.json {
        match serde_json::to_string(&result) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: Cannot serialize result: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        if !result.stdout.is_empty() {
            print!("{}", result.stdout);
        }
        if !result.stderr.is_empty() {
            eprint!("{}", result.stderr);
        }
    }

    std::process::exit(result.exit_code);
}

//! Run a script in a local MicroPython REPL and print its output events.
//!
//! Output is printed as it arrives. Ctrl-C interrupts the script instead of
//! killing the demo.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example run_script -- --code "print(1+1)"
//! cargo run --example run_script -- --file blink.py --executable ./micropython --json
//! ```

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use futures_util::StreamExt;
use replwire::{BackendEvent, SessionBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let script = match (&args.code, &args.file) {
        (Some(code), _) => code.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => {
            eprintln!("Error: Must provide either --code or --file");
            std::process::exit(1);
        }
    };

    let (mut session, mut events) = SessionBuilder::subprocess(&args.executable)
        .probe_timeout(Duration::from_millis(args.probe_ms))
        .build()?;

    println!("Starting {}...", args.executable.display());
    session.open().await?;
    if let Some(welcome) = session.welcome() {
        print!("{}", welcome.text);
    }
    println!("Helpers installed ({:?})\n", session.capability());

    let json = args.json;
    let printer = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if json {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => eprintln!("Failed to encode event: {}", e),
                }
                continue;
            }
            if let BackendEvent::ProgramOutput { data, .. } = event {
                print!("{}", data);
                let _ = io::stdout().flush();
            }
        }
    });

    let interrupts = session.side_commands();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n[interrupt]");
            if !interrupts.interrupt() {
                break;
            }
        }
    });

    let result = session.execute(&script).await?;
    println!(
        "\n--- finished in {:?}{} ---",
        result.elapsed,
        if result.has_traceback() {
            " with a traceback"
        } else {
            ""
        }
    );

    session.close().await?;
    drop(session);
    printer.await?;

    Ok(())
}

struct Args {
    executable: PathBuf,
    code: Option<String>,
    file: Option<PathBuf>,
    probe_ms: u64,
    json: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut executable = PathBuf::from("micropython");
        let mut code = None;
        let mut file = None;
        let mut probe_ms = 100u64;
        let mut json = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--executable" | "-e" => {
                    i += 1;
                    if i < args.len() {
                        executable = PathBuf::from(&args[i]);
                    }
                }
                "--code" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        code = Some(args[i].clone());
                    }
                }
                "--file" | "-f" => {
                    i += 1;
                    if i < args.len() {
                        file = Some(PathBuf::from(&args[i]));
                    }
                }
                "--probe-ms" => {
                    i += 1;
                    if i < args.len() {
                        probe_ms = args[i].parse().unwrap_or(100);
                    }
                }
                "--json" => json = true,
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {}", other);
                    Self::print_help();
                    std::process::exit(1);
                }
            }
            i += 1;
        }

        Self {
            executable,
            code,
            file,
            probe_ms,
            json,
        }
    }

    fn print_help() {
        println!("Usage: run_script [OPTIONS]");
        println!();
        println!("Options:");
        println!("  -e, --executable <PATH>  Interpreter executable [default: micropython]");
        println!("  -c, --code <CODE>        Code to run");
        println!("  -f, --file <PATH>        Script file to run");
        println!("      --probe-ms <MS>      Partial prompt probe timeout [default: 100]");
        println!("      --json               Print events as JSON lines");
        println!("      --help               Print this help");
    }
}

//! clipwire — move a file between two machines through a shared clipboard.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clipwire_core::config::ClipwireConfig;

mod backend;
mod cmd;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Send {
        file: PathBuf,
        archive: bool,
        yes: bool,
    },
    Receive {
        output: PathBuf,
    },
    InitConfig,
    Help,
}

#[derive(Debug, PartialEq, Eq)]
struct Cli {
    backend: Option<String>,
    channel_file: Option<PathBuf>,
    command: Command,
}

fn print_usage() {
    println!("Usage: clipwire [--backend <name>] [--channel-file <path>] <command>");
    println!();
    println!("Commands:");
    println!("  send -f <path> [-a] [-y]   Send a file (-a: compress first, -y: don't prompt)");
    println!("  receive -o <path>          Receive a file into <path>");
    println!("  init-config                Write the default config file");
    println!();
    println!("Options:");
    println!("  --backend <name>       auto, xclip, xsel, wl-clipboard, pbcopy, powershell, file");
    println!("  --channel-file <path>  Use a file as the channel (implies --backend file)");
    println!();
    println!("Config: {}", ClipwireConfig::file_path().display());
}

fn parse_args(args: &[String]) -> Result<Cli> {
    let mut backend = None;
    let mut channel_file = None;
    let mut file = None;
    let mut output = None;
    let mut archive = false;
    let mut yes = false;
    let mut words: Vec<&str> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        let mut value = |flag: &str| -> Result<String> {
            i += 1;
            args.get(i)
                .cloned()
                .with_context(|| format!("{flag} requires a value"))
        };
        match arg {
            "--backend" => backend = Some(value(arg)?),
            "--channel-file" => channel_file = Some(PathBuf::from(value(arg)?)),
            "--file" | "-f" => file = Some(PathBuf::from(value(arg)?)),
            "--output" | "-o" => output = Some(PathBuf::from(value(arg)?)),
            "--archive" | "-a" => archive = true,
            "--yes" | "-y" => yes = true,
            "--help" | "-h" => words.push("help"),
            flag if flag.starts_with('-') => bail!("unknown option: {flag}"),
            word => words.push(word),
        }
        i += 1;
    }

    let command = match words.as_slice() {
        ["send"] => Command::Send {
            file: file.context("send requires --file <path>")?,
            archive,
            yes,
        },
        ["receive"] => Command::Receive {
            output: output.context("receive requires --output <path>")?,
        },
        ["init-config"] => Command::InitConfig,
        ["help"] | [] => Command::Help,
        other => bail!("unknown command: {}", other.join(" ")),
    };

    Ok(Cli {
        backend,
        channel_file,
        command,
    })
}

fn load_config(cli: &Cli) -> Result<ClipwireConfig> {
    let mut config = ClipwireConfig::load().context("failed to load configuration")?;
    if let Some(path) = &cli.channel_file {
        config.channel.file_path = path.clone();
        config.channel.backend = "file".to_string();
    }
    if let Some(backend) = &cli.backend {
        config.channel.backend = backend.clone();
    }
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            eprintln!();
            print_usage();
            return Ok(ExitCode::FAILURE);
        }
    };

    match &cli.command {
        Command::Help => {
            print_usage();
            Ok(ExitCode::SUCCESS)
        }
        Command::InitConfig => {
            cmd::init_config::run()?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Send { file, archive, yes } => {
            let config = load_config(&cli)?;
            let channel = backend::open(&config.channel)?;
            let options = cmd::send::SendOptions {
                file,
                archive: *archive,
                yes: *yes,
            };
            cmd::send::run(channel, &config, options).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Receive { output } => {
            let config = load_config(&cli)?;
            let channel = backend::open(&config.channel)?;
            cmd::receive::run(channel, &config, output).await
        }
    }
}

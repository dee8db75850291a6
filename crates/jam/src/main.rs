use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use jam_core::{
    list_output_ports, CommandError, ConfigManager, LogOutput, MidiPortOutput, NoteOutput,
    SessionCommand, SessionController, Settings,
};
use tokio::io::{AsyncBufReadExt, BufReader};

mod control;

use control::{process_command, Reply};

/// Generative drum, bass and melody jam session over MIDI.
#[derive(Parser, Debug)]
#[command(name = "jam")]
#[command(about = "Interactive generative MIDI jam session")]
struct Args {
    /// Configuration file (defaults to ~/.jam/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Connect to the first MIDI output whose name contains this text
    #[arg(short, long)]
    port: Option<String>,

    /// Name of the virtual port created when no output matches
    #[arg(long)]
    virtual_name: Option<String>,

    /// Fail instead of creating a virtual port when no output matches
    #[arg(long)]
    no_virtual: bool,

    /// Starting tempo (60-200)
    #[arg(short, long)]
    bpm: Option<u32>,

    /// Seed for reproducible patterns
    #[arg(long)]
    seed: Option<u64>,

    /// Log notes instead of sending them to a MIDI port
    #[arg(long)]
    dry_run: bool,

    /// List MIDI output ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Start playing immediately
    #[arg(short, long)]
    autostart: bool,
}

impl Args {
    fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(port) = &self.port {
            settings.midi_port = port.clone();
        }
        if let Some(name) = &self.virtual_name {
            settings.virtual_port_name = name.clone();
        }
        if self.no_virtual {
            settings.create_virtual_port = false;
        }
        if let Some(bpm) = self.bpm {
            settings.bpm = bpm;
        }
        if self.seed.is_some() {
            settings.seed = self.seed;
        }
    }
}

fn open_output(settings: &Settings, dry_run: bool) -> Result<Arc<dyn NoteOutput>, anyhow::Error> {
    if dry_run {
        return Ok(Arc::new(LogOutput::default()));
    }

    let output = if settings.create_virtual_port {
        MidiPortOutput::connect_or_create(&settings.midi_port, &settings.virtual_port_name)
    } else {
        MidiPortOutput::connect(&settings.midi_port)
    }
    .with_context(|| format!("Failed to open MIDI output '{}'", settings.midi_port))?;

    Ok(Arc::new(output))
}

fn prompt() {
    print!("jam> ");
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list_ports {
        let ports = list_output_ports()?;
        if ports.is_empty() {
            println!("No MIDI output ports found");
        }
        for (i, name) in ports.iter().enumerate() {
            println!("{}: {}", i, name);
        }
        return Ok(());
    }

    let mut config = ConfigManager::new(args.config.clone());
    let mut settings = config.load().context("Failed to load configuration")?;
    args.apply_overrides(&mut settings);
    ConfigManager::validate_settings(&settings)
        .map_err(|errors| anyhow!("Invalid settings: {}", errors.join(", ")))?;

    let controller = SessionController::from_settings(&settings)?;
    controller.bind_output(open_output(&settings, args.dry_run)?);

    println!("Jam session ready. Type 'help' for commands.");
    if args.autostart {
        controller.start()?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read from stdin")?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                log::info!("Received Ctrl-C");
                break;
            }
        };

        // EOF
        let Some(line) = line else {
            break;
        };

        let command = match line.parse::<SessionCommand>() {
            Ok(command) => command,
            Err(CommandError::Empty) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match process_command(&controller, command) {
            Ok(Reply::Message(message)) => println!("{}", message),
            Ok(Reply::Quit) => break,
            Err(e) => println!("Error: {}", e),
        }
    }

    println!("Stopping jam session...");
    controller.shutdown().await;
    Ok(())
}

use std::{
    io,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread,
};

use clap::{Parser, Subcommand};
use lifeline::{
    AppConfig, DispatchStage, DispatchTracker, LifelineError, start_session,
    sos::{
        ContactId, SosPhase, SosSession, WARNING_SECONDS,
        tone::{SilentTone, TerminalBell, Tone, ToneDevice},
    },
    tracking::{
        PositionSource, ReplayPositionSource, TrackingSnapshot, UnavailablePositionSource,
        observe_tracking,
    },
    view, writer,
};
use log::{error, info, warn};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Print log output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the SOS countdown, then track the dispatched ambulance
    Sos {
        /// Cancel automatically after this many seconds of warning countdown
        #[arg(long)]
        cancel_after: Option<u32>,

        /// Do not sound the alert
        #[arg(long)]
        silent: bool,

        /// Extra contact ids to notify
        #[arg(short, long)]
        contact: Vec<String>,

        /// Record tracking snapshots to a JSON Lines file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Track a simulated ambulance heading to the user
    Track {
        /// Stop after this many ticks instead of on arrival
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Replay user positions from a JSON Lines file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Record tracking snapshots to a JSON Lines file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write the active settings to the config file so they can be edited
    Config {
        /// Overwrite the saved file with the defaults
        #[arg(long)]
        reset: bool,
    },
}

enum AlertDevice {
    Bell(TerminalBell<io::Stdout>),
    Silent(SilentTone),
    #[cfg(feature = "audio")]
    Speaker(lifeline::sos::tone::Speaker),
}

impl ToneDevice for AlertDevice {
    fn play(&mut self, tone: &Tone) -> Result<(), LifelineError> {
        match self {
            AlertDevice::Bell(bell) => bell.play(tone),
            AlertDevice::Silent(silent) => silent.play(tone),
            #[cfg(feature = "audio")]
            AlertDevice::Speaker(speaker) => speaker.play(tone),
        }
    }
}

fn make_alert_device(audible: bool) -> Result<AlertDevice, LifelineError> {
    if !audible {
        return Ok(AlertDevice::Silent(SilentTone::default()));
    }
    #[cfg(feature = "audio")]
    match lifeline::sos::tone::Speaker::default_output() {
        Ok(speaker) => return Ok(AlertDevice::Speaker(speaker)),
        Err(e) => warn!("Falling back to terminal bell: {}", e),
    }
    Ok(AlertDevice::Bell(TerminalBell::stdout()?))
}

fn sos(
    config: AppConfig,
    cancel_after: Option<u32>,
    silent: bool,
    contacts: &[String],
    output: Option<PathBuf>,
) -> Result<(), LifelineError> {
    let dispatched = Arc::new(AtomicBool::new(false));
    let audible = config.ring_bell && !silent;

    let mut session = SosSession::new();
    for id in contacts {
        session.toggle_contact(ContactId::new(id.as_str()));
    }

    let on_dispatched = dispatched.clone();
    let stream = start_session(
        session,
        move || make_alert_device(audible),
        move || on_dispatched.store(true, Ordering::SeqCst),
        config.tick_interval(),
    );

    let control = stream.control();
    let auto_cancel = stream.control();
    let handler_dispatched = dispatched.clone();
    let mut interrupted = false;
    ctrlc::set_handler(move || {
        if interrupted || handler_dispatched.load(Ordering::SeqCst) {
            println!("Exiting...");
            std::process::exit(0);
        }
        interrupted = true;
        control.cancel();
    })
    .map_err(|e| LifelineError::InvalidUserInput {
        field: "ctrl-c handler".to_string(),
        reason: e.to_string(),
    })?;

    let mut last = None;
    for session in stream {
        println!("{}", view::render_sos(&session, &config.contacts));
        if session.phase == SosPhase::Warning {
            let elapsed = WARNING_SECONDS.saturating_sub(session.seconds_remaining_in_phase);
            if cancel_after.is_some_and(|limit| elapsed >= limit) {
                info!("Cancelling SOS after {} seconds", elapsed);
                auto_cancel.cancel();
            }
        }
        last = Some(session);
    }

    match last {
        Some(session) if session.is_dispatched() && dispatched.load(Ordering::SeqCst) => {
            info!(
                "Notified contacts: {:?}",
                session
                    .notify_contacts()
                    .iter()
                    .map(|id| config.contact_name(id))
                    .collect::<Vec<_>>()
            );
            let tracker = DispatchTracker::from_session(&session);
            track_dispatch(UnavailablePositionSource, tracker, &config, None, output)
        }
        _ => {
            println!("SOS cancelled");
            Ok(())
        }
    }
}

fn track(
    config: AppConfig,
    ticks: Option<u64>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<(), LifelineError> {
    ctrlc::set_handler(move || {
        println!("Exiting...");
        std::process::exit(0);
    })
    .map_err(|e| LifelineError::InvalidUserInput {
        field: "ctrl-c handler".to_string(),
        reason: e.to_string(),
    })?;

    let tracker = DispatchTracker::new();
    match input {
        Some(input) => {
            let source = ReplayPositionSource::from_file(&input)?;
            info!("Replaying {} positions from {:?}", source.remaining(), input);
            track_dispatch(source, tracker, &config, ticks, output)
        }
        None => track_dispatch(UnavailablePositionSource, tracker, &config, ticks, output),
    }
}

fn save_config(config: AppConfig, reset: bool) -> Result<(), LifelineError> {
    let config = if reset { AppConfig::default() } else { config };
    config.save()?;
    println!("Saved config to {:?}", AppConfig::default_path()?);
    Ok(())
}

fn track_dispatch(
    source: impl PositionSource + Send + 'static,
    mut tracker: DispatchTracker,
    config: &AppConfig,
    ticks: Option<u64>,
    output: Option<PathBuf>,
) -> Result<(), LifelineError> {
    let simulator = config.simulator()?;
    // if we need to write an output file the snapshots are also forwarded to a writer thread
    let recorder = output.map(|output_file| {
        let (snapshot_tx, snapshot_rx) = mpsc::channel::<TrackingSnapshot>();
        let handle = thread::spawn(move || writer::write_tracking(&output_file, snapshot_rx));
        (snapshot_tx, handle)
    });

    let limit = ticks.map(|t| t as usize).unwrap_or(usize::MAX);
    println!("{}", view::render_timeline(tracker.stage()));

    let stream = observe_tracking(source, simulator, config.tick_interval());
    for snapshot in stream.take(limit) {
        let previous_stage = tracker.stage();
        let stage = tracker.tick();
        if stage != previous_stage {
            println!("{}", view::render_timeline(stage));
        }
        println!("{}", view::render_tracking(&snapshot, &tracker, &config.response_team));

        if let Some((snapshot_tx, _)) = &recorder {
            snapshot_tx.send(snapshot)?;
        }
        if ticks.is_none() && stage == DispatchStage::Arrived {
            println!("{}", view::render_arrival(&config.response_team));
            break;
        }
    }

    if let Some((snapshot_tx, handle)) = recorder {
        drop(snapshot_tx);
        match handle.join() {
            Ok(result) => {
                result?;
            }
            Err(_) => warn!("Tracking writer thread panicked"),
        }
    }
    Ok(())
}

fn main() {
    let cli = Args::parse();
    if cli.verbose || cfg!(debug_assertions) {
        colog::init();
    }

    let config = match AppConfig::from_local_file() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            warn!("Ignoring unreadable config file: {}", e);
            AppConfig::default()
        }
    };

    let result = match cli.command {
        Commands::Sos {
            cancel_after,
            silent,
            contact,
            output,
        } => sos(config, cancel_after, silent, &contact, output),
        Commands::Track {
            ticks,
            input,
            output,
        } => track(config, ticks, input, output),
        Commands::Config { reset } => save_config(config, reset),
    };

    if let Err(e) = result {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

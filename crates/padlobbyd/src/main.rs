mod cli;

use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use crossbeam_channel::{never, select, unbounded};

use padlobby_gamepad::DeviceManager;
use padlobby_workspace::{
    ConfigEvent, MemoryProfileStore, StartButtonLookup, Workspace, WorkspaceConfig,
};
use padlobbyd::api::{self, ApiTransport, UnixSocket};
use padlobbyd::lobby::Lobby;
use padlobbyd::signals::SignalHub;
use padlobbyd::{logging, print_error, print_info, print_warning};

use crate::cli::{Cli, Command};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::setup(cli.verbose, cli.no_color).expect("Unable to set up logger");

    let workspace = match Workspace::new(cli.workspace.as_deref()) {
        Ok(workspace) => workspace,
        Err(e) => {
            print_error!("failed to open workspace: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Run => run(&workspace),
        Command::Promote { id } => send(&workspace, api::Command::Promote { unique_id: id }),
        Command::Clear => send(&workspace, api::Command::ClearReady),
        Command::StartButton {
            vid,
            pid,
            name,
            code,
        } => send(
            &workspace,
            api::Command::SetStartButton {
                vendor_id: vid,
                product_id: pid,
                name,
                code,
            },
        ),
        Command::Watch => watch(&workspace),
        Command::Battery { id, percent } => send(
            &workspace,
            api::Command::UpdateBattery {
                unique_id: id,
                percent,
            },
        ),
    }
}

fn send(workspace: &Workspace, command: api::Command) -> ExitCode {
    let socket = UnixSocket::new(workspace.socket_path());
    match socket.send_event(command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error!("failed to send command to {}: {e}", socket.path().display());
            ExitCode::FAILURE
        }
    }
}

fn watch(workspace: &Workspace) -> ExitCode {
    let socket = UnixSocket::new(workspace.socket_path());
    let lines = match socket.watch() {
        Ok(lines) => lines,
        Err(e) => {
            print_error!("failed to watch {}: {e}", socket.path().display());
            return ExitCode::FAILURE;
        }
    };
    let mut stdout = io::stdout().lock();
    for line in lines {
        let written = line.and_then(|line| writeln!(stdout, "{line}"));
        if let Err(e) = written {
            print_error!("watch stream ended: {e}");
            return ExitCode::FAILURE;
        }
    }
    print_info!("daemon closed the watch stream");
    ExitCode::SUCCESS
}

fn run(workspace: &Workspace) -> ExitCode {
    let config = match workspace.load_config() {
        Ok(config) => config,
        Err(e) => {
            print_error!("failed to load {}: {e}", workspace.config_path().display());
            return ExitCode::FAILURE;
        }
    };
    let store = Arc::new(MemoryProfileStore::with_config(&config));

    let mut manager = match DeviceManager::new(
        config.runtime_settings(),
        Arc::new(StartButtonLookup(store.clone())),
    ) {
        Ok(manager) => manager,
        Err(e) => {
            print_error!("failed to start device manager: {e}");
            return ExitCode::FAILURE;
        }
    };
    let device_rx = manager.subscribe();
    let signals = Arc::new(SignalHub::new());
    let mut lobby = Lobby::new(store.clone(), signals.clone());

    // Handle Ctrl+C to exit cleanly
    let (stop_tx, stop_rx) = unbounded::<()>();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    }) {
        print_error!("failed to set Ctrl+C handler: {e}");
        return ExitCode::FAILURE;
    }

    let (api_tx, mut api_rx) = unbounded::<api::Command>();
    let socket = UnixSocket::new(workspace.socket_path()).with_signals(signals);
    if let Err(e) = socket.listen_events(api_tx) {
        print_error!("failed to start api: {e}");
        return ExitCode::FAILURE;
    }

    // The watcher reports over std::mpsc; bridge it to crossbeam.
    let (config_tx, mut config_rx) = unbounded::<ConfigEvent>();
    let _watcher = match workspace.start_config_watcher() {
        Ok((watcher, std_rx)) => {
            thread::spawn(move || {
                while let Ok(event) = std_rx.recv() {
                    if config_tx.send(event).is_err() {
                        break;
                    }
                }
            });
            Some(watcher)
        }
        Err(e) => {
            print_warning!("workspace file will not be watched: {e}");
            None
        }
    };

    print_info!("padlobbyd started in {}", workspace.path().display());
    loop {
        let mut api_closed = false;
        let mut watcher_closed = false;
        select! {
            recv(stop_rx) -> _ => break,
            recv(device_rx) -> msg => match msg {
                Ok(event) => lobby.handle_device_event(event),
                Err(_) => {
                    print_error!("device event channel closed");
                    break;
                }
            },
            recv(api_rx) -> msg => match msg {
                Ok(command) => handle_command(&mut lobby, &manager, command),
                Err(_) => {
                    print_warning!("api listener stopped");
                    api_closed = true;
                }
            },
            recv(config_rx) -> msg => match msg {
                Ok(event) => handle_config_event(&mut lobby, &store, event),
                Err(_) => watcher_closed = true,
            },
        }
        // Closed channels are always ready; park them.
        if api_closed {
            api_rx = never();
        }
        if watcher_closed {
            config_rx = never();
        }
    }

    print_info!("stopping");
    if let Err(e) = manager.shutdown() {
        print_error!("device manager did not stop cleanly: {e}");
    }
    let _ = fs::remove_file(socket.path());
    ExitCode::SUCCESS
}

fn handle_command(lobby: &mut Lobby, manager: &DeviceManager, command: api::Command) {
    match command {
        api::Command::Promote { unique_id } => {
            lobby.promote(&unique_id);
        }
        api::Command::ClearReady => {
            lobby.clear_ready();
        }
        api::Command::SetStartButton {
            vendor_id,
            product_id,
            name,
            code,
        } => {
            if let Err(e) = lobby.set_start_button(vendor_id, product_id, &name, code) {
                print_warning!("start button override not stored: {e}");
            }
            if let Err(e) = manager.set_start_button(vendor_id, product_id, &name, code) {
                print_error!("failed to apply start button override: {e}");
            }
        }
        api::Command::UpdateBattery { unique_id, percent } => {
            lobby.update_battery(&unique_id, percent);
        }
        api::Command::Watch => print_warning!("watch request reached the daemon loop"),
    }
}

fn handle_config_event(lobby: &mut Lobby, store: &MemoryProfileStore, event: ConfigEvent) {
    let config = match event {
        ConfigEvent::Changed(config) => {
            print_info!("workspace file changed, reloading profiles");
            config
        }
        ConfigEvent::Removed => {
            print_info!("workspace file removed, using defaults");
            WorkspaceConfig::default()
        }
        ConfigEvent::Error(e) => {
            print_error!("failed to reload workspace file: {e}");
            return;
        }
    };
    match store.apply_config(&config) {
        Ok(changed) => lobby.refresh_profiles(&changed),
        Err(e) => print_error!("failed to apply workspace file: {e}"),
    }
}

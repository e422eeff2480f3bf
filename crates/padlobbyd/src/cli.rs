use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use padlobby_gamepad::ButtonCode;

#[derive(Debug, Subcommand, PartialEq)]
pub(crate) enum Command {
    /// Run the daemon in the foreground.
    Run,
    /// Promote a connected controller to ready.
    Promote {
        /// Unique id of the controller
        id: String,
    },
    /// Move every ready controller back to connected.
    Clear,
    /// Override the start button for a controller type.
    StartButton {
        /// Vendor id, decimal or 0x hex
        #[arg(long, value_parser = parse_id, default_value = "0")]
        vid: u16,
        /// Product id, decimal or 0x hex
        #[arg(long, value_parser = parse_id, default_value = "0")]
        pid: u16,
        /// Name pattern, used when no ids are given
        #[arg(long, default_value = "")]
        name: String,
        /// Button name (e.g. tr2) or code
        #[arg(long, value_parser = parse_code)]
        code: ButtonCode,
    },
    /// Print lobby signals from the running daemon until interrupted.
    Watch,
    /// Report a battery reading for a controller.
    Battery {
        /// Unique id of the controller
        id: String,
        /// Charge in percent
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },
}

/// Tracks game controllers and lets players ready up with a button combo.
#[derive(Parser)]
#[command(version, about, long_about = None)]
pub(crate) struct Cli {
    /// Turn debugging information on
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Workspace directory holding padlobby.yaml and the api socket
    #[arg(short, long, global = true)]
    pub workspace: Option<PathBuf>,

    /// The command to run
    #[clap(subcommand)]
    pub command: Command,
}

fn parse_id(value: &str) -> Result<u16, String> {
    let parsed = match value.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid id {value}: {e}"))
}

fn parse_code(value: &str) -> Result<ButtonCode, String> {
    padlobby_workspace::parse_button_name(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_button_accepts_hex_ids_and_names() {
        let cli = Cli::try_parse_from([
            "padlobbyd",
            "start-button",
            "--vid",
            "0x057e",
            "--pid",
            "8215",
            "--code",
            "tr2",
        ])
        .expect("parse");
        assert_eq!(
            cli.command,
            Command::StartButton {
                vid: 0x057e,
                pid: 0x2017,
                name: String::new(),
                code: padlobby_gamepad::codes::BTN_TR2,
            }
        );
    }

    #[test]
    fn battery_rejects_out_of_range_percent() {
        assert!(Cli::try_parse_from(["padlobbyd", "battery", "abc", "101"]).is_err());
        let cli = Cli::try_parse_from(["padlobbyd", "battery", "abc", "80"]).expect("parse");
        assert_eq!(
            cli.command,
            Command::Battery {
                id: "abc".into(),
                percent: 80
            }
        );
    }

    #[test]
    fn watch_takes_no_arguments() {
        let cli = Cli::try_parse_from(["padlobbyd", "watch"]).expect("parse");
        assert_eq!(cli.command, Command::Watch);
        assert!(Cli::try_parse_from(["padlobbyd", "watch", "extra"]).is_err());
    }

    #[test]
    fn workspace_flag_is_global() {
        let cli = Cli::try_parse_from(["padlobbyd", "run", "--workspace", "/tmp/pl"]).expect("parse");
        assert_eq!(cli.command, Command::Run);
        assert_eq!(cli.workspace, Some(PathBuf::from("/tmp/pl")));
    }
}

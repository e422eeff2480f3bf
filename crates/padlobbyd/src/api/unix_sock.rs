use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Lines, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bitcode::{Decode, Encode};
use crossbeam_channel::Sender;

use super::{ApiError, ApiResult, ApiTransport, Command};
use crate::signals::SignalHub;
use crate::{print_debug, print_error, print_info};

const MAX_COMMAND_LEN: usize = 64 * 1024;
/// A client that stalls mid-frame is dropped after this long.
const READ_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Encode, Decode)]
struct SocketCommand {
    command: Command,
}

pub struct UnixSocket {
    socket_path: PathBuf,
    read_timeout: Duration,
    signals: Option<Arc<SignalHub>>,
}

impl UnixSocket {
    pub fn new<P: AsRef<Path>>(socket_path: P) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            read_timeout: READ_TIMEOUT,
            signals: None,
        }
    }

    /// Lets `watch` clients subscribe to `signals`.
    #[must_use]
    pub fn with_signals(mut self, signals: Arc<SignalHub>) -> Self {
        self.signals = Some(signals);
        self
    }

    /// Overrides how long the listener waits for a client's frame.
    #[must_use]
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }

    fn read_command(stream: &mut UnixStream) -> ApiResult<Command> {
        let mut length_buffer = [0u8; 4];
        stream.read_exact(&mut length_buffer)?;
        let length = u32::from_be_bytes(length_buffer) as usize;
        if length == 0 {
            return Err(ApiError::Empty);
        }
        if length > MAX_COMMAND_LEN {
            return Err(ApiError::TooLarge(length));
        }

        let mut data_buffer = vec![0u8; length];
        stream.read_exact(&mut data_buffer)?;
        let decoded: SocketCommand = bitcode::decode(&data_buffer)?;
        Ok(decoded.command)
    }

    fn write_command(stream: &UnixStream, command: Command) -> ApiResult<()> {
        let mut writer = BufWriter::new(stream);
        let encoded = bitcode::encode(&SocketCommand { command });
        let length = u32::try_from(encoded.len()).map_err(|_| ApiError::TooLarge(encoded.len()))?;
        writer.write_all(&length.to_be_bytes())?;
        writer.write_all(&encoded)?;
        writer.flush()?;
        Ok(())
    }

    fn handle_connection(
        mut stream: UnixStream,
        tx: &Sender<Command>,
        signals: Option<&Arc<SignalHub>>,
        read_timeout: Duration,
    ) {
        if let Err(e) = stream
            .set_read_timeout(Some(read_timeout))
            .and_then(|()| stream.set_write_timeout(Some(read_timeout)))
        {
            print_error!("failed to set api socket timeout: {e}");
            return;
        }
        let reply = match Self::read_command(&mut stream) {
            Ok(Command::Watch) => match signals {
                Some(hub) => {
                    Self::start_watch(stream, hub);
                    return;
                }
                None => "ERR signals unavailable\n".to_string(),
            },
            Ok(command) => {
                print_debug!("api command {command:?}");
                if tx.send(command).is_ok() {
                    "OK\n".to_string()
                } else {
                    "ERR daemon stopping\n".to_string()
                }
            }
            Err(err) => {
                print_error!("failed to read api command: {err}");
                format!("ERR {err}\n")
            }
        };
        let _ = stream.write_all(reply.as_bytes());
    }

    fn start_watch(mut stream: UnixStream, hub: &Arc<SignalHub>) {
        // Subscribe before acknowledging so nothing emitted after OK is lost.
        let rx = hub.subscribe();
        if stream.write_all(b"OK\n").is_err() {
            return;
        }
        let spawned = thread::Builder::new()
            .name("padlobbyd-watch".into())
            .spawn(move || {
                for signal in rx {
                    if writeln!(stream, "{signal}").is_err() {
                        print_debug!("watch client went away");
                        break;
                    }
                }
            });
        if let Err(e) = spawned {
            print_error!("failed to start watch stream: {e}");
        }
    }

    /// Subscribes to a running daemon's signals. Each line is one signal.
    pub fn watch(&self) -> ApiResult<Lines<BufReader<UnixStream>>> {
        let stream = UnixStream::connect(&self.socket_path)?;
        Self::write_command(&stream, Command::Watch)?;
        let mut reader = BufReader::new(stream);
        let mut reply = String::new();
        reader.read_line(&mut reply)?;
        if let Some(reason) = reply.trim_end().strip_prefix("ERR ") {
            return Err(ApiError::Rejected(reason.to_string()));
        }
        Ok(reader.lines())
    }
}

impl ApiTransport for UnixSocket {
    fn listen_events(&self, tx: Sender<Command>) -> ApiResult<JoinHandle<()>> {
        let socket_path = self.socket_path.clone();
        let read_timeout = self.read_timeout;
        let signals = self.signals.clone();
        if socket_path.exists() {
            fs::remove_file(&socket_path)?;
        }
        let listener = UnixListener::bind(&socket_path)?;
        print_info!("unix socket api listening at {}", socket_path.display());

        let handle = thread::Builder::new()
            .name("padlobbyd-socket-api".into())
            .spawn(move || {
                for stream in listener.incoming() {
                    match stream {
                        Ok(stream) => {
                            Self::handle_connection(stream, &tx, signals.as_ref(), read_timeout);
                        }
                        Err(e) => {
                            print_error!("control socket accept error: {e}");
                            break;
                        }
                    }
                }
            })?;
        Ok(handle)
    }

    fn send_event(&self, event: Command) -> ApiResult<()> {
        let stream = UnixStream::connect(&self.socket_path)?;
        Self::write_command(&stream, event)?;

        let mut reply = String::new();
        BufReader::new(stream).read_line(&mut reply)?;
        match reply.trim_end().strip_prefix("ERR ") {
            Some(reason) => Err(ApiError::Rejected(reason.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::unbounded;

    use super::*;
    use crate::signals::Signal;

    fn socket_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("padlobbyd-{}-{name}.sock", std::process::id()))
    }

    #[test]
    fn commands_round_trip_through_the_socket() {
        let socket = UnixSocket::new(socket_path("roundtrip"));
        let (tx, rx) = unbounded();
        let _listener = socket.listen_events(tx).expect("listen");

        let command = Command::SetStartButton {
            vendor_id: 0x057e,
            product_id: 0x2017,
            name: "SNES Controller".into(),
            code: 0x139,
        };
        socket.send_event(command.clone()).expect("send");
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).expect("recv"), command);

        socket.send_event(Command::ClearReady).expect("send");
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).expect("recv"),
            Command::ClearReady
        );
        let _ = fs::remove_file(socket.path());
    }

    #[test]
    fn empty_frame_is_rejected() {
        let path = socket_path("empty");
        let socket = UnixSocket::new(&path);
        let (tx, rx) = unbounded();
        let _listener = socket.listen_events(tx).expect("listen");

        let mut stream = UnixStream::connect(&path).expect("connect");
        stream.write_all(&0u32.to_be_bytes()).expect("write");
        let mut reply = String::new();
        BufReader::new(stream).read_line(&mut reply).expect("reply");
        assert_eq!(reply, "ERR empty command\n");
        assert!(rx.try_recv().is_err());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn stalled_client_does_not_block_the_listener() {
        let path = socket_path("stalled");
        let socket = UnixSocket::new(&path).with_read_timeout(Duration::from_millis(100));
        let (tx, rx) = unbounded();
        let _listener = socket.listen_events(tx).expect("listen");

        let mut stalled = UnixStream::connect(&path).expect("connect");
        stalled.write_all(&[0, 0]).expect("partial length");

        socket.send_event(Command::ClearReady).expect("send");
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).expect("recv"),
            Command::ClearReady
        );

        let mut reply = String::new();
        BufReader::new(stalled).read_line(&mut reply).expect("reply");
        assert!(reply.starts_with("ERR "), "unexpected reply {reply:?}");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn watch_streams_signals_as_lines() {
        let path = socket_path("watch");
        let hub = Arc::new(SignalHub::new());
        let socket = UnixSocket::new(&path).with_signals(hub.clone());
        let (tx, rx) = unbounded();
        let _listener = socket.listen_events(tx).expect("listen");

        let mut lines = socket.watch().expect("watch");
        hub.emit(Signal::Battery {
            unique_id: "aa".into(),
            percent: 55,
        });
        hub.emit(Signal::Disconnected {
            unique_id: "aa".into(),
        });
        assert_eq!(lines.next().expect("line").expect("read"), "battery aa 55%");
        assert_eq!(lines.next().expect("line").expect("read"), "disconnected aa");
        assert!(rx.try_recv().is_err());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn watch_without_signals_is_rejected() {
        let path = socket_path("nowatch");
        let socket = UnixSocket::new(&path);
        let (tx, _rx) = unbounded();
        let _listener = socket.listen_events(tx).expect("listen");
        assert!(matches!(socket.watch(), Err(ApiError::Rejected(_))));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn send_without_daemon_fails() {
        let socket = UnixSocket::new(socket_path("missing"));
        assert!(matches!(
            socket.send_event(Command::ClearReady),
            Err(ApiError::Io(_))
        ));
    }
}

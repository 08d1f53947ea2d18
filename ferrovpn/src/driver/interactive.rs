//! Interactive shell automation.
//!
//! Some provisioning commands stop and wait for keystrokes: a passphrase,
//! a `yes` confirmation, a CA name. [`run_interactive`] starts a shell,
//! types the command, then watches stdout and stderr byte by byte. When
//! output ends with a known prompt marker the configured reply is typed;
//! when it ends with the completion marker, stdin is closed so the shell
//! exits.
//!
//! Task layout per invocation:
//!
//! ```text
//!   stdout ──> scan task ──┐
//!                          ├── mpsc ──> input relay ──> stdin
//!   stderr ──> scan task ──┘
//! ```
//!
//! The relay is the only writer of stdin, so reply lines from the two
//! scanners can never interleave.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::response::InteractiveOutcome;
use crate::channel::{Console, PromptScanner, PromptTable, ScanEvent};
use crate::error::{Result, SessionError};
use crate::transport::{InputStream, Launch, OutputStream, RemoteSession, Transport};

/// How long stream tasks may keep echoing buffered output after the shell exits.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Settings for one interactive run.
#[derive(Debug, Clone, Default)]
pub struct InteractiveOptions {
    /// Give up if the shell has not exited by then. `None` waits forever.
    pub timeout: Option<Duration>,

    /// Where remote output is echoed.
    pub console: Console,
}

/// A request to the input relay.
#[derive(Debug)]
enum Input {
    /// The initial command line.
    Command(String),

    /// Reply of the prompt at this match-order index.
    Reply(usize),

    /// Close stdin.
    Close,
}

#[derive(Debug, Default)]
struct Progress {
    completed: AtomicBool,
    replies: AtomicUsize,
}

/// Drive `command` through an interactive shell, answering `prompts`.
///
/// Returns once the shell exits. A non-zero exit status is an error even
/// when the completion marker was seen.
pub(crate) async fn run_interactive<T: Transport>(
    transport: &T,
    command: &str,
    prompts: &PromptTable,
    options: &InteractiveOptions,
) -> Result<InteractiveOutcome> {
    info!("$ {} (interactive)", command);
    let start = Instant::now();

    let mut session = transport.open_session().await?;
    let io = session.start(Launch::Shell).await?;

    let progress = Arc::new(Progress::default());
    let (input, requests) = mpsc::unbounded_channel();
    // Dropping the set aborts every task still running
    let mut tasks = JoinSet::new();

    tasks.spawn(relay_input(
        io.stdin,
        requests,
        prompts.clone(),
        progress.clone(),
    ));
    input
        .send(Input::Command(command.to_string()))
        .map_err(|_| SessionError::Task("input relay stopped".into()))?;

    tasks.spawn(scan_stream(
        "stdout",
        io.stdout,
        options.console.stdout(),
        PromptScanner::new(prompts.clone()),
        input.clone(),
        progress.clone(),
    ));
    tasks.spawn(scan_stream(
        "stderr",
        io.stderr,
        options.console.stderr(),
        PromptScanner::new(prompts.clone()),
        input,
        progress.clone(),
    ));

    let waited = match options.timeout {
        Some(limit) => match tokio::time::timeout(limit, session.wait()).await {
            Ok(waited) => waited,
            Err(_) => {
                warn!("shell still running after {:?}, giving up", limit);
                Err(SessionError::Timeout(limit).into())
            }
        },
        None => session.wait().await,
    };

    if waited.is_ok() {
        let drained = tokio::time::timeout(DRAIN_GRACE, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            trace!("stream tasks still running after exit, aborting");
        }
    }
    tasks.abort_all();
    let closed = session.close().await;

    waited?.into_result()?;
    closed?;

    let outcome = InteractiveOutcome {
        completed: progress.completed.load(Ordering::SeqCst),
        replies_sent: progress.replies.load(Ordering::SeqCst),
        elapsed: start.elapsed(),
    };
    debug!("interactive run finished: {:?}", outcome);
    Ok(outcome)
}

/// Sole owner of the shell's stdin.
async fn relay_input(
    mut stdin: InputStream,
    mut requests: mpsc::UnboundedReceiver<Input>,
    prompts: PromptTable,
    progress: Arc<Progress>,
) {
    while let Some(request) = requests.recv().await {
        let (mut line, is_reply) = match request {
            Input::Command(command) => (command.into_bytes(), false),
            Input::Reply(index) => match prompts.get(index) {
                Some(prompt) => (prompt.reply().expose().as_bytes().to_vec(), true),
                None => continue,
            },
            Input::Close => {
                debug!("closing shell input");
                if let Err(e) = stdin.shutdown().await {
                    warn!("failed to close shell input: {}", e);
                }
                return;
            }
        };
        line.push(b'\n');

        // One write per line keeps lines whole
        let written = async {
            stdin.write_all(&line).await?;
            stdin.flush().await
        }
        .await;
        if let Err(e) = written {
            warn!("failed to write to shell input: {}", e);
            return;
        }
        if is_reply {
            progress.replies.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Read one output stream byte by byte, echoing it and reacting to markers.
async fn scan_stream(
    name: &'static str,
    stream: OutputStream,
    console: Box<dyn AsyncWrite + Send + Unpin>,
    mut scanner: PromptScanner,
    input: mpsc::UnboundedSender<Input>,
    progress: Arc<Progress>,
) {
    let mut reader = BufReader::new(stream);
    let mut echo = BufWriter::new(console);

    loop {
        let byte = match reader.read_u8().await {
            Ok(byte) => byte,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                trace!("{}: end of stream", name);
                break;
            }
            Err(e) => {
                warn!("{}: read failed: {}", name, e);
                break;
            }
        };

        let _ = echo.write_all(&[byte]).await;
        if reader.buffer().is_empty() {
            // Nothing more queued; make partial lines such as prompts visible
            let _ = echo.flush().await;
        }

        match scanner.feed(byte) {
            ScanEvent::Pending => {}
            ScanEvent::Reply(hits) => {
                for index in hits {
                    if let Some(prompt) = scanner.table().get(index) {
                        debug!(
                            "{}: matched {:?}, replying {:?}",
                            name,
                            prompt.marker(),
                            prompt.loggable_reply()
                        );
                    }
                    // A closed relay means input is already shut
                    let _ = input.send(Input::Reply(index));
                }
            }
            ScanEvent::Complete => {
                info!("{}: completion marker {:?} seen", name, scanner.table().completion());
                progress.completed.store(true, Ordering::SeqCst);
                let _ = input.send(Input::Close);
                // Keep reading so the process never writes into a closed pipe
                if let Err(e) = tokio::io::copy_buf(&mut reader, &mut echo).await {
                    trace!("{}: drain after completion failed: {}", name, e);
                }
                break;
            }
        }
    }

    let _ = echo.flush().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::transport::LocalTransport;
    use secrecy::SecretString;

    fn quiet() -> InteractiveOptions {
        InteractiveOptions {
            timeout: Some(Duration::from_secs(20)),
            console: Console::Quiet,
        }
    }

    fn pki_prompts() -> PromptTable {
        PromptTable::builder("Data Base Updated")
            .secret_prompt("phrase:", SecretString::from("secret123".to_string()))
            .prompt("removal:", "yes")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_answers_prompts_and_completes() {
        // The script only prints the completion line if both replies arrived intact
        let script = concat!(
            "printf 'Enter pass phrase:'; read pass; ",
            "printf 'Confirm removal:' >&2; read answer; ",
            "if [ \"$pass\" = secret123 ] && [ \"$answer\" = yes ]; ",
            "then echo 'Data Base Updated'; else echo \"bad input: $pass/$answer\"; fi"
        );

        let outcome = run_interactive(&LocalTransport::new(), script, &pki_prompts(), &quiet())
            .await
            .unwrap();

        assert!(outcome.completed);
        assert_eq!(outcome.replies_sent, 2);
    }

    #[tokio::test]
    async fn test_completion_closes_input_despite_trailing_output() {
        // Without stdin closing, the shell would block reading the next line
        let outcome = run_interactive(
            &LocalTransport::new(),
            "printf 'Data Base Updated and more bytes after it'",
            &pki_prompts(),
            &quiet(),
        )
        .await
        .unwrap();

        assert!(outcome.completed);
        assert_eq!(outcome.replies_sent, 0);
    }

    #[tokio::test]
    async fn test_output_after_completion_is_drained() {
        // A closed stdout pipe would kill the process with SIGPIPE here
        let outcome = run_interactive(
            &LocalTransport::new(),
            "echo 'Data Base Updated'; sleep 0.3; echo 'Updating CRL'; echo 'CRL done' >&2; exit 0",
            &pki_prompts(),
            &quiet(),
        )
        .await
        .unwrap();

        assert!(outcome.completed);
    }

    #[tokio::test]
    async fn test_simultaneous_prompts_get_whole_lines() {
        let prompts = PromptTable::builder("pair ok")
            .prompt("first:", "A")
            .prompt("second:", "B")
            .build()
            .unwrap();
        // Both prompts are out before the first read
        let script = concat!(
            "printf 'first:'; printf 'second:' >&2; read x; read y; ",
            "case \"$x/$y\" in A/B|B/A) echo 'pair ok' ;; ",
            "*) echo \"bad: $x/$y\"; exit 1 ;; esac"
        );

        let outcome = run_interactive(&LocalTransport::new(), script, &prompts, &quiet())
            .await
            .unwrap();

        assert!(outcome.completed);
        assert_eq!(outcome.replies_sent, 2);
    }

    #[tokio::test]
    async fn test_nonzero_exit_after_completion_is_error() {
        let result = run_interactive(
            &LocalTransport::new(),
            "echo 'Data Base Updated'; false",
            &pki_prompts(),
            &quiet(),
        )
        .await;

        assert!(matches!(
            result,
            Err(Error::Session(SessionError::ExitStatus { status: 1 }))
        ));
    }

    #[tokio::test]
    async fn test_scan_stream_matches_across_read_boundaries() {
        let stream = tokio_test::io::Builder::new()
            .read(b"Enter pass")
            .read(b" phrase:")
            .read(b"\nConfirm removal:")
            .read(b"\nData Base Updated")
            .build();
        let prompts = pki_prompts();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let progress = Arc::new(Progress::default());

        scan_stream(
            "stdout",
            Box::new(stream),
            Console::Quiet.stdout(),
            PromptScanner::new(prompts.clone()),
            tx,
            progress.clone(),
        )
        .await;

        let mut answered = Vec::new();
        let mut closed = false;
        while let Ok(input) = rx.try_recv() {
            match input {
                Input::Reply(index) => {
                    answered.push(prompts.get(index).unwrap().marker().to_string())
                }
                Input::Close => closed = true,
                Input::Command(_) => panic!("scanner sent a command"),
            }
        }
        assert_eq!(answered, vec!["phrase:", "removal:"]);
        assert!(closed);
        assert!(progress.completed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_never_completing_shell_does_not_return() {
        let options = InteractiveOptions {
            timeout: None,
            console: Console::Quiet,
        };
        let prompts = pki_prompts();
        let transport = LocalTransport::new();
        let run = run_interactive(&transport, "sleep 30", &prompts, &options);

        let bounded = tokio::time::timeout(Duration::from_millis(500), run).await;
        assert!(bounded.is_err(), "interactive run returned early");
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let options = InteractiveOptions {
            timeout: Some(Duration::from_millis(300)),
            console: Console::Quiet,
        };
        let result = run_interactive(&LocalTransport::new(), "sleep 30", &pki_prompts(), &options)
            .await;

        assert!(matches!(
            result,
            Err(Error::Session(SessionError::Timeout(_)))
        ));
    }
}

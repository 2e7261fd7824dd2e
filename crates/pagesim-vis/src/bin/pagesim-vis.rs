//! Pagesim terminal viewer
//!
//! Connects to a page-replacement simulation service and renders every
//! access to the terminal.
//!
//! Commands (one per line on stdin):
//!   access <page>          Access one page
//!   run <p1,p2,...>        Replay a sequence, paced
//!   cancel                 Stop a running sequence
//!   frames <n>             Set frame count (resets the simulation)
//!   algo <name>            Select algorithm (resets the simulation)
//!   pages <n>              Resize the page-table grid
//!   reset                  Reset the simulation
//!   state                  Print the current state as JSON
//!   help                   Show this list
//!   quit                   Exit

use std::ops::ControlFlow;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use pagesim_vis::{
    AlgorithmId, Canvas, ClientConfig, HttpGateway, InputController, RunOutcome, Session,
    TextCanvas,
};
use tokio::io::{AsyncBufReadExt, BufReader};

type Controller<C> = InputController<HttpGateway, C>;

#[derive(Parser)]
#[command(
    name = "pagesim-vis",
    version,
    about = "Terminal viewer for a page-replacement simulation service"
)]
struct Cli {
    /// Base URL of the simulation service (env: PAGESIM_SERVER_URL)
    #[arg(short, long)]
    server: Option<String>,

    /// Initial replacement algorithm (env: PAGESIM_ALGORITHM)
    #[arg(short, long)]
    algorithm: Option<String>,

    /// Initial frame count (env: PAGESIM_FRAME_COUNT)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    frames: Option<u64>,

    /// Page-table grid size (env: PAGESIM_PAGE_TABLE_SIZE)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    page_table_size: Option<u64>,

    /// Delay between sequence steps in milliseconds (env: PAGESIM_PACING_MS)
    #[arg(long)]
    pacing_ms: Option<u64>,
}

impl Cli {
    fn apply(self, config: &mut ClientConfig) {
        if let Some(server) = self.server {
            config.server_url = server;
        }
        if let Some(algorithm) = self.algorithm {
            config.simulation.algorithm = AlgorithmId::new(algorithm);
        }
        if let Some(frames) = self.frames {
            config.simulation.frame_count = frames as usize;
        }
        if let Some(size) = self.page_table_size {
            config.simulation.page_table_size = size as usize;
        }
        if let Some(ms) = self.pacing_ms {
            config.pacing = Duration::from_millis(ms);
        }
    }
}

/// One input line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Empty,
    Quit,
    Help,
    Cancel,
    State,
    Pages(String),
    Access(String),
    Run(String),
    Frames(String),
    Algo(String),
    Reset,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim().to_string()),
            None => (line, String::new()),
        };

        match command {
            "" => Self::Empty,
            "quit" | "exit" => Self::Quit,
            "help" => Self::Help,
            "cancel" => Self::Cancel,
            "state" => Self::State,
            "pages" => Self::Pages(arg),
            "access" => Self::Access(arg),
            "run" => Self::Run(arg),
            "frames" => Self::Frames(arg),
            "algo" => Self::Algo(arg),
            "reset" => Self::Reset,
            other => Self::Unknown(other.to_string()),
        }
    }
}

fn print_usage() {
    eprintln!("Commands:");
    eprintln!("  access <page>          Access one page");
    eprintln!("  run <p1,p2,...>        Replay a sequence, paced");
    eprintln!("  cancel                 Stop a running sequence");
    eprintln!("  frames <n>             Set frame count (resets the simulation)");
    eprintln!("  algo <name>            Select algorithm (resets the simulation)");
    eprintln!("  pages <n>              Resize the page-table grid");
    eprintln!("  reset                  Reset the simulation");
    eprintln!("  state                  Print the current state as JSON");
    eprintln!("  help                   Show this list");
    eprintln!("  quit                   Exit");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    pagesim_logging::init(pagesim_logging::DEFAULT_DIRECTIVES);

    let cli = Cli::parse();
    let mut config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    cli.apply(&mut config);

    let gateway = match HttpGateway::new(&config.server_url) {
        Ok(gateway) => gateway,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(server = %config.server_url, "Starting pagesim viewer");

    let session = Arc::new(Session::new(
        gateway,
        TextCanvas::new(std::io::stdout()),
        config.simulation,
        config.pacing,
    ));
    if let Err(e) = session.start().await {
        tracing::warn!(error = %e, "initial configure failed");
    }

    let controller = Arc::new(InputController::new(session));
    print_usage();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                return ExitCode::FAILURE;
            }
        };

        if handle(&controller, Command::parse(&line)).is_break() {
            break;
        }
    }

    controller.session().cancel_run();
    ExitCode::SUCCESS
}

/// Act on one command without waiting on the service.
///
/// Local commands run inline. Anything that makes a round trip runs on its
/// own task, so a request that never answers leaves the prompt usable.
fn handle<C: Canvas + 'static>(
    controller: &Arc<Controller<C>>,
    command: Command,
) -> ControlFlow<()> {
    match command {
        Command::Empty => {}
        Command::Quit => return ControlFlow::Break(()),
        Command::Help => print_usage(),
        Command::Cancel => {
            if !controller.session().cancel_run() {
                eprintln!("No sequence is running");
            }
        }
        Command::State => match serde_json::to_string_pretty(&controller.session().snapshot()) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error: {}", e),
        },
        Command::Pages(raw) => {
            if let Err(e) = controller.page_table_size_changed(&raw) {
                tracing::debug!(error = %e, "page table resize rejected");
            }
        }
        Command::Run(raw) => spawn_run(controller, raw),
        Command::Unknown(other) => eprintln!("Unknown command: {} (try 'help')", other),
        remote => spawn_remote(controller, remote),
    }
    ControlFlow::Continue(())
}

fn spawn_remote<C: Canvas + 'static>(controller: &Arc<Controller<C>>, command: Command) {
    let controller = Arc::clone(controller);
    tokio::spawn(async move {
        let outcome = match &command {
            Command::Access(raw) => controller.access_clicked(raw).await.map(|_| ()),
            Command::Frames(raw) => controller.frame_count_changed(raw).await,
            Command::Algo(raw) => controller.algorithm_changed(raw).await,
            Command::Reset => controller.reset_clicked().await,
            _ => Ok(()),
        };
        if let Err(e) = outcome {
            tracing::debug!(error = %e, ?command, "command failed");
        }
    });
}

fn spawn_run<C: Canvas + 'static>(controller: &Arc<Controller<C>>, raw: String) {
    let controller = Arc::clone(controller);
    tokio::spawn(async move {
        match controller.run_clicked(&raw).await {
            Ok(report) => match report.outcome {
                RunOutcome::Completed => {
                    eprintln!("Sequence finished ({} steps)", report.applied_steps)
                }
                RunOutcome::Cancelled => eprintln!(
                    "Sequence cancelled after {} of {} steps",
                    report.applied_steps, report.total_steps
                ),
                RunOutcome::Failed(e) => eprintln!("Sequence stopped: {}", e),
                RunOutcome::Rejected => eprintln!("A sequence is already running"),
            },
            Err(e) => tracing::debug!(error = %e, "run rejected"),
        }
    });
}

#[cfg(test)]
mod tests {
    use pagesim_vis::SimulationConfig;
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn zero_sizes_are_rejected() {
        assert!(Cli::try_parse_from(["pagesim-vis", "--frames", "0"]).is_err());
        assert!(Cli::try_parse_from(["pagesim-vis", "--page-table-size", "0"]).is_err());

        let cli = Cli::try_parse_from(["pagesim-vis", "--frames", "3", "-p", "32"]).unwrap();
        let mut config = ClientConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.simulation.frame_count, 3);
        assert_eq!(config.simulation.page_table_size, 32);
    }

    #[test]
    fn command_parsing() {
        assert_eq!(Command::parse("  access 7 "), Command::Access("7".to_string()));
        assert_eq!(Command::parse("run 1, 2,3"), Command::Run("1, 2,3".to_string()));
        assert_eq!(Command::parse("reset"), Command::Reset);
        assert_eq!(Command::parse(""), Command::Empty);
        assert_eq!(Command::parse("exit"), Command::Quit);
        assert_eq!(Command::parse("swap 3"), Command::Unknown("swap".to_string()));
    }

    #[tokio::test]
    async fn hung_service_leaves_prompt_responsive() {
        // Accepts connections through the backlog but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let session = Session::new(
            HttpGateway::new(&format!("http://{}", addr)).unwrap(),
            TextCanvas::new(Vec::new()),
            SimulationConfig::default(),
            Duration::from_millis(500),
        );
        let controller = Arc::new(InputController::new(Arc::new(session)));

        assert!(handle(&controller, Command::Access("1".to_string())).is_continue());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(controller.session().snapshot().counters.total_accesses, 1);

        assert!(handle(&controller, Command::Pages("8".to_string())).is_continue());
        assert_eq!(controller.session().config().page_table_size, 8);
        assert!(handle(&controller, Command::Cancel).is_continue());
        assert!(handle(&controller, Command::Quit).is_break());

        drop(listener);
    }
}

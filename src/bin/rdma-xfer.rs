use std::io;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use rdma_xfer::sink::{JsonSink, LogSink, StatusSink};
use rdma_xfer::Config;

/// Send or receive one file over a reliable RDMA connection.
#[derive(Parser, Debug)]
#[command(name = "rdma-xfer", version, about)]
struct Cli {
    /// TOML configuration file with a `[transfer]` table.
    #[arg(short, long, env = "RDMA_XFER_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on or connect to.
    #[arg(short, long)]
    port: Option<u16>,

    /// Size of the registered buffer, i.e., the largest message.
    #[arg(long)]
    buffer_capacity: Option<usize>,

    /// Print status events as JSON lines on stdout.
    #[arg(long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
#[cfg_attr(not(rdma_verbs), allow(dead_code))]
enum Command {
    /// Send FILE to the responder on SERVER.
    Send { server: String, file: PathBuf },

    /// Wait for one initiator and store the file it sends.
    Recv {
        /// Where to store the received file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_toml(path)?,
            None => Config::default(),
        };
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(capacity) = self.buffer_capacity {
            config.buffer_capacity = capacity;
        }
        if let Command::Recv {
            output: Some(output),
        } = &self.command
        {
            config.output_path = output.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(rdma_verbs)]
fn run(command: Command, config: Config, sink: &mut dyn StatusSink) -> anyhow::Result<()> {
    use rdma_xfer::role::{Initiator, Responder};

    let report = match command {
        Command::Send { server, file } => Initiator::new(config)
            .send_file(&server, &file, sink)
            .with_context(|| format!("cannot send {}", file.display()))?,
        Command::Recv { .. } => Responder::new(config)
            .receive_file(sink)
            .context("cannot receive file")?,
    };
    log::debug!("{:?}", report);
    Ok(())
}

#[cfg(not(rdma_verbs))]
fn run(_: Command, _: Config, _: &mut dyn StatusSink) -> anyhow::Result<()> {
    anyhow::bail!("rdma-xfer was built without libibverbs and librdmacm")
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.load_config().context("bad configuration")?;

    // Termination signals make the transfer fail at its next wait.
    rdma_xfer::stop::install_handlers().context("cannot install signal handlers")?;

    let mut json_sink;
    let mut log_sink = LogSink;
    let sink: &mut dyn StatusSink = if cli.json {
        json_sink = JsonSink::new(io::stdout());
        &mut json_sink
    } else {
        &mut log_sink
    };
    run(cli.command, config, sink)
}

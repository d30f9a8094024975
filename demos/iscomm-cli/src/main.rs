use std::{
    fs::File,
    io::{self, Read, Write},
    path::PathBuf,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use iscomm::{BaudRate, CommConfig, CommInstance, IsbVersion, ProtocolType};
use log::{debug, info, warn};
use serialport::SerialPort;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Serial port connected to the device
    #[arg(short, long, conflicts_with = "file")]
    port: Option<String>,

    /// Baud rate of the serial port
    #[arg(short = 's', long, default_value_t = 921_600)]
    baud: u32,

    /// Parse a capture file instead of a serial port
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Send requests with the length prefixed ISB v2 framing
    #[arg(long)]
    v2: bool,

    /// Disable the ISB v1 byte escaping
    #[arg(long)]
    no_encoding: bool,

    /// Stop all broadcasts before listening
    #[arg(long)]
    stop_broadcasts: bool,

    /// Data set to request, may be repeated
    #[arg(short = 'd', long = "get-data", value_name = "DID")]
    get_data: Vec<u32>,

    /// Broadcast period of requested data sets, as a multiple of their base period
    #[arg(long, default_value_t = 1)]
    period: u32,
}

enum Input {
    Port(Box<dyn SerialPort>),
    File(File),
}

impl Input {
    fn open(cli: &Cli) -> Result<Self> {
        if let Some(path) = &cli.file {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            return Ok(Input::File(file));
        }
        let Some(port) = &cli.port else {
            bail!("either --port or --file is required");
        };
        let baud = BaudRate::try_from(cli.baud)?;
        let port = serialport::new(port, baud.into())
            .timeout(Duration::from_millis(100))
            .open()
            .with_context(|| format!("opening serial port {port}"))?;
        Ok(Input::Port(port))
    }

    /// `None` once a capture file is exhausted
    fn read(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        let result = match self {
            Input::Port(port) => port.read(buf),
            Input::File(file) => file.read(buf),
        };
        match result {
            Ok(0) if matches!(self, Input::File(_)) => Ok(None),
            Ok(n) => Ok(Some(n)),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Some(0)),
            Err(e) => Err(e.into()),
        }
    }

    fn send(&mut self, frame: &[u8]) -> Result<()> {
        match self {
            Input::Port(port) => port.write_all(frame).context("writing request"),
            Input::File(_) => {
                debug!("not sending {} bytes to a capture file", frame.len());
                Ok(())
            },
        }
    }
}

fn describe(comm: &CommInstance<'_>, protocol: ProtocolType) -> String {
    let len = comm.packet().map_or(0, <[u8]>::len);
    match protocol {
        ProtocolType::IsbData => {
            let hdr = comm.data_header();
            format!(
                "ISB data    did {:3} offset {:4} size {:4}",
                hdr.id, hdr.offset, hdr.size
            )
        },
        ProtocolType::IsbCmd => format!("ISB command {:?}", comm.command()),
        ProtocolType::IsbAck => match comm.ack() {
            Some(ack) => format!(
                "ISB {:?} of {:?}, counter {}",
                ack.kind,
                ack.header.acked_id(),
                ack.header.pkt_counter
            ),
            None => "ISB ack".to_string(),
        },
        ProtocolType::Ascii => {
            let sentence = comm.packet().unwrap_or_default();
            format!("ASCII       {}", String::from_utf8_lossy(sentence).trim_end())
        },
        other => format!("{:<11} {len} bytes", format!("{other:?}")),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    let cli = Cli::parse();

    let mut input = Input::open(&cli)?;
    let config = CommConfig::default()
        .with_tx_version(if cli.v2 { IsbVersion::V2 } else { IsbVersion::V1 })
        .with_packet_encoding(!cli.no_encoding);
    let mut rx = vec![0u8; 2 * iscomm::constants::PKT_BUF_SIZE];
    let mut tx = vec![0u8; iscomm::constants::PKT_BUF_SIZE];
    let mut comm = CommInstance::with_config(&mut rx, &mut tx, config);

    if cli.stop_broadcasts {
        input.send(comm.stop_broadcasts_all_ports()?)?;
    }
    for &did in &cli.get_data {
        input.send(comm.get_data(did, 0, 0, cli.period)?)?;
    }

    info!("waiting for frames...");
    let mut frames = 0usize;
    loop {
        if comm.free() == 0 {
            warn!("receive buffer full, resetting parser");
            comm.reset();
        }
        let Some(count) = input.read(comm.spare_capacity_mut())? else {
            break;
        };
        comm.commit(count)?;
        loop {
            match comm.parse() {
                ProtocolType::None => break,
                ProtocolType::ParseError => {
                    warn!("dropped frame: {:?}", comm.last_error());
                },
                protocol => {
                    frames += 1;
                    println!("{}", describe(&comm, protocol));
                },
            }
        }
    }
    info!(
        "{frames} frames, {} parse errors",
        comm.rx_error_count()
    );
    Ok(())
}

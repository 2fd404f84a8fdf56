use std::path::PathBuf;

use clap::{Parser, Subcommand};
use num_bigint_dig::BigInt;

use private_comparison::error::ProtocolError;
use private_comparison::mpc::comparison::ComparatorKind;
use private_comparison::network::client::Client;
use private_comparison::network::config::ServerConfig;
use private_comparison::network::server::Server;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Run the helper side: generate keys, listen, serve sessions.
    Server {
        #[arg(long = "config")]
        config: Option<PathBuf>,

        #[arg(long = "bind")]
        bind: Option<String>,
    },

    /// Run a query: an encrypted argmax over the given values.
    Client {
        #[arg(long = "server", default_value = "127.0.0.1:1990")]
        server: String,

        #[arg(short = 'l', long = "bit-length", default_value_t = 8)]
        bit_length: usize,

        #[arg(long = "key-bits", default_value_t = 1024)]
        key_bits: usize,

        #[arg(long = "lambda", default_value_t = 100)]
        lambda: usize,

        /// Use the DGK comparator instead of LSIC.
        #[arg(long = "dgk")]
        dgk: bool,

        values: Vec<u64>,
    },
}

pub fn main() {
    env_logger::builder().filter_level(log::LevelFilter::Info).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Server { config, bind } => {
            let mut config = config.map(|p| ServerConfig::load(&p)).unwrap_or_default();
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            match Server::bind(config) {
                Ok(server) => server.run(),
                Err(err) => eprintln!("Can not run the server: {err}"),
            }
        }
        Commands::Client { server, bit_length, key_bits, lambda, dgk, values } => {
            let comparator = if dgk { ComparatorKind::Dgk } else { ComparatorKind::Lsic };
            if let Err(err) = run_client(&server, bit_length, key_bits, lambda, comparator, &values)
            {
                eprintln!("Query failed: {err}");
            }
        }
    }
}

fn run_client(
    server: &str,
    bit_length: usize,
    key_bits: usize,
    lambda: usize,
    comparator: ComparatorKind,
    values: &[u64],
) -> Result<(), ProtocolError> {
    if values.is_empty() {
        eprintln!("No values given; nothing to compare");
        return Ok(());
    }

    let mut client = Client::connect(server, key_bits, lambda)?;
    client.exchange_keys()?;

    let candidates = values
        .iter()
        .map(|&v| client.encrypt_for_server(&BigInt::from(v)))
        .collect::<Result<Vec<_>, _>>()?;

    let index = client.run_linear_argmax_owner(&candidates, bit_length, comparator)?;
    println!("argmax index: {index} (value {})", values[index]);

    if values.len() >= 2 {
        let less = client.run_enc_compare_owner(
            candidates[0].clone(),
            candidates[1].clone(),
            bit_length,
            comparator,
        )?;
        println!("values[0] < values[1]: {less}");
    }

    client.disconnect();
    Ok(())
}

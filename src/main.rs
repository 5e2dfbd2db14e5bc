use clap::Parser;
use tracing::{error, info};

use rcss_agent::agent::Agent;
use rcss_agent::behavior::DemoBehavior;
use rcss_agent::config::Config;

/// RoboCup simulation soccer agent
#[derive(Parser, Debug)]
#[command(name = "rcss-agent", version, about)]
struct Args {
    /// Team name to join as
    #[arg(short, long, default_value = "default")]
    team: String,

    /// Simulation server host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Server port (players 6000, coach 6002)
    #[arg(short, long, default_value_t = 6000)]
    port: u16,

    /// Connect as the team's goalie
    #[arg(short, long)]
    goalie: bool,

    /// TOML config file; overrides the other flags when given
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => {
            let mut config = Config::default_for_team(&args.team);
            config.host = args.host.clone();
            config.port = args.port;
            config.goalie = args.goalie;
            config
        }
    };

    info!(
        team = %config.team_name,
        host = %config.host,
        port = config.port,
        goalie = config.goalie,
        "connecting to simulation server"
    );

    let mut agent = Agent::connect(config).await?;
    agent.play(DemoBehavior)?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, disconnecting");
        }
        result = agent.join() => {
            if let Err(e) = result {
                error!(error = %e, "connection lost");
            }
        }
    }

    agent.disconnect().await;
    Ok(())
}

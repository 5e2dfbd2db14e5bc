//! The agent core: connection state machine plus the two per-agent
//! activities, receive/dispatch and think/act.
//!
//! The receive task is the world model's only writer; the think task only
//! ever sees cloned snapshots delivered over a channel, and feeds issued
//! motion commands back over a second channel. Shutdown is cooperative
//! through a watch flag with a bounded grace period.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::actions::{ActionQueue, Command};
use crate::behavior::Behavior;
use crate::config::Config;
use crate::connection::{Connection, ConnectionError};
use crate::dispatch::{dispatch, MessageType};
use crate::sexpr::parse;
use crate::world::WorldModel;

const INIT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);
const CYCLE_CHANNEL_CAPACITY: usize = 32;
const MOTION_CHANNEL_CAPACITY: usize = 8;

const BYE_COMMAND: &str = "(bye)";

/// Lifecycle of one agent instance. Terminal agents cannot be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Disconnected,
    Connecting,
    /// Connected and initialized, think loop not yet running.
    Idle,
    Playing,
    Terminal,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("connection fault: {0}")]
    Connection(#[from] ConnectionError),
    #[error("no init response from the server within {0:?}")]
    InitTimeout(Duration),
    #[error("operation not valid in state {0:?}")]
    InvalidState(AgentState),
}

/// One perception cycle handed from the receive task to the think task.
struct Cycle {
    world: WorldModel,
    flush_due: bool,
}

pub struct Agent {
    config: Config,
    state: AgentState,
    conn: Option<Connection>,
    world: Option<WorldModel>,
    shutdown: watch::Sender<bool>,
    receive_handle: Option<JoinHandle<Result<(), ConnectionError>>>,
    think_handle: Option<JoinHandle<()>>,
}

/// The init message announcing this agent to the server.
fn init_command(config: &Config) -> String {
    let goalie = if config.goalie { " (goalie)" } else { "" };
    format!(
        "(init {} (version {}){})",
        config.team_name, config.version, goalie
    )
}

impl Agent {
    /// Open the socket, announce the agent, and wait (bounded) for the
    /// server's init response, which also pins the dedicated per-agent
    /// channel. Returns an `Idle` agent ready to play.
    pub async fn connect(config: Config) -> Result<Self, AgentError> {
        let (shutdown, _) = watch::channel(false);
        let mut world = if config.localization.use_particle_filter {
            WorldModel::with_particle_filter(config.team_name.as_str(), config.localization.particles)
        } else {
            WorldModel::new(config.team_name.as_str())
        };

        let conn = Connection::open(&config.host, config.port).await?;
        conn.send(&init_command(&config)).await?;

        // the first reply arrives from the freshly allocated per-agent
        // port; Connection::recv adopts it as the new peer
        let first = tokio::time::timeout(INIT_RESPONSE_TIMEOUT, conn.recv())
            .await
            .map_err(|_| AgentError::InitTimeout(INIT_RESPONSE_TIMEOUT))?
            .map_err(AgentError::Connection)?;

        match parse(&first) {
            Ok(exprs) => {
                for expr in &exprs {
                    if let Err(e) = dispatch(&mut world, expr) {
                        warn!(error = %e, "message not handled during init");
                    }
                }
            }
            Err(e) => warn!(error = %e, "dropping malformed init response"),
        }

        info!(
            team = %config.team_name,
            side = ?world.side,
            uniform_number = ?world.uniform_number,
            "connected to simulation server"
        );

        Ok(Self {
            config,
            state: AgentState::Idle,
            conn: Some(conn),
            world: Some(world),
            shutdown,
            receive_handle: None,
            think_handle: None,
        })
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The world model as initialized, readable until `play` hands it to
    /// the receive task.
    pub fn world(&self) -> Option<&WorldModel> {
        self.world.as_ref()
    }

    /// Spawn the receive and think activities and start playing.
    pub fn play<B: Behavior + 'static>(&mut self, behavior: B) -> Result<(), AgentError> {
        if self.state != AgentState::Idle {
            return Err(AgentError::InvalidState(self.state));
        }
        let conn = self.conn.clone().expect("idle agent has a connection");
        let world = self.world.take().expect("idle agent has a world model");

        let (cycle_tx, cycle_rx) = mpsc::channel(CYCLE_CHANNEL_CAPACITY);
        let (motion_tx, motion_rx) = mpsc::channel(MOTION_CHANNEL_CAPACITY);

        self.receive_handle = Some(tokio::spawn(receive_loop(
            conn.clone(),
            world,
            cycle_tx,
            motion_rx,
            self.shutdown.subscribe(),
        )));
        self.think_handle = Some(tokio::spawn(think_loop(
            conn,
            behavior,
            cycle_rx,
            motion_tx,
            self.shutdown.subscribe(),
        )));

        self.state = AgentState::Playing;
        Ok(())
    }

    /// Wait for the receive activity to end: either a cooperative
    /// shutdown (Ok) or a terminal connection fault (Err).
    pub async fn join(&mut self) -> Result<(), AgentError> {
        let Some(handle) = self.receive_handle.take() else {
            return Err(AgentError::InvalidState(self.state));
        };
        match handle.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.state = AgentState::Terminal;
                Err(AgentError::Connection(e))
            }
            Err(e) => {
                error!(error = %e, "receive task panicked");
                self.state = AgentState::Terminal;
                Ok(())
            }
        }
    }

    /// Send the terminal bye, signal both activities to stop, and give
    /// them a bounded grace period before proceeding regardless.
    pub async fn disconnect(&mut self) {
        if self.state == AgentState::Terminal {
            return;
        }
        if let Some(conn) = &self.conn {
            if let Err(e) = conn.send(BYE_COMMAND).await {
                warn!(error = %e, "failed to send bye");
            }
        }
        let _ = self.shutdown.send(true);

        if let Some(mut handle) = self.receive_handle.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                warn!("activity did not stop within the grace period, aborting it");
                handle.abort();
            }
        }
        if let Some(mut handle) = self.think_handle.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                warn!("activity did not stop within the grace period, aborting it");
                handle.abort();
            }
        }

        self.conn = None;
        self.state = AgentState::Terminal;
        info!("disconnected");
    }
}

/// Receive activity: the sole writer of the world model.
///
/// Blocks on the socket, parses and dispatches every line, applies motion
/// feedback from the think side, and publishes a world snapshot per
/// dispatched line. A malformed line is dropped; an unknown message type
/// is logged; only a socket fault ends the loop with an error.
async fn receive_loop(
    conn: Connection,
    mut world: WorldModel,
    cycle_tx: mpsc::Sender<Cycle>,
    mut motion_rx: mpsc::Receiver<Command>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ConnectionError> {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return Ok(());
                }
            }
            Some(command) = motion_rx.recv() => {
                world.apply_motion(&command);
            }
            message = conn.recv() => {
                let text = match message {
                    Ok(text) => text,
                    Err(e) => {
                        error!(error = %e, "socket fault, receive activity ending");
                        return Err(e);
                    }
                };
                let exprs = match parse(&text) {
                    Ok(exprs) => exprs,
                    Err(e) => {
                        warn!(error = %e, "dropping malformed line");
                        continue;
                    }
                };
                let mut flush_due = false;
                for expr in &exprs {
                    match dispatch(&mut world, expr) {
                        // commands for a cycle go out when the body sense
                        // for that cycle has arrived
                        Ok(MessageType::SenseBody) => flush_due = true,
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "message not handled"),
                    }
                }
                if !exprs.is_empty()
                    && cycle_tx
                        .send(Cycle { world: world.clone(), flush_due })
                        .await
                        .is_err()
                {
                    // think task is gone; nothing left to feed
                    return Ok(());
                }
            }
        }
    }
}

/// Think activity: the sole consumer of perception cycles and the sole
/// producer into the action queue. Never blocks on the network beyond
/// sending; idles on the channel when no fresh data is pending.
async fn think_loop<B: Behavior>(
    conn: Connection,
    mut behavior: B,
    mut cycle_rx: mpsc::Receiver<Cycle>,
    motion_tx: mpsc::Sender<Command>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut actions = ActionQueue::new();
    let mut first_cycle = true;

    loop {
        let cycle = tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
                continue;
            }
            cycle = cycle_rx.recv() => match cycle {
                Some(cycle) => cycle,
                None => return,
            },
        };

        if first_cycle {
            behavior.on_connect(&cycle.world, &mut actions).await;
            first_cycle = false;
        }
        behavior.think(&cycle.world, &mut actions).await;

        // the immediate side channel (coach eye) skips the flush cadence
        for command in actions.take_immediate() {
            if let Err(e) = conn.send(&command.render()).await {
                error!(error = %e, "failed to send command, think activity ending");
                return;
            }
        }

        if cycle.flush_due {
            for command in actions.flush() {
                if let Err(e) = conn.send(&command.render()).await {
                    error!(error = %e, "failed to send command, think activity ending");
                    return;
                }
                if command.is_primary() {
                    // open-loop prediction input for the particle filter
                    let _ = motion_tx.send(command).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tokio::net::UdpSocket;

    #[test]
    fn test_init_command_format() {
        let mut config = Config::default_for_team("testers");
        assert_eq!(init_command(&config), "(init testers (version 15))");
        config.goalie = true;
        assert_eq!(init_command(&config), "(init testers (version 15) (goalie))");
    }

    async fn fake_server() -> (UdpSocket, u16) {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        (server, port)
    }

    #[tokio::test]
    async fn test_connect_handshake() {
        let (server, port) = fake_server().await;

        let server_task = tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (len, agent_addr) = server.recv_from(&mut buf).await.unwrap();
            assert_eq!(&buf[..len], b"(init testers (version 15))");

            // reply from a dedicated per-agent socket
            let channel = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            channel
                .send_to(b"(init r 3 before_kick_off)", agent_addr)
                .await
                .unwrap();
        });

        let mut config = Config::default_for_team("testers");
        config.host = "127.0.0.1".into();
        config.port = port;
        config.localization.use_particle_filter = false;

        let agent = Agent::connect(config).await.unwrap();
        server_task.await.unwrap();

        assert_eq!(agent.state(), AgentState::Idle);
        let world = agent.world().unwrap();
        assert_eq!(world.side, Some(crate::objects::Side::Right));
        assert_eq!(world.uniform_number, Some(3));
    }

    #[tokio::test]
    async fn test_connect_times_out_without_server() {
        // a bound socket that never answers
        let (_server, port) = fake_server().await;

        let mut config = Config::default_for_team("testers");
        config.host = "127.0.0.1".into();
        config.port = port;

        // shrink the wait by racing the library timeout with a shorter one
        let result =
            tokio::time::timeout(Duration::from_secs(10), Agent::connect(config)).await;
        assert!(matches!(result, Ok(Err(AgentError::InitTimeout(_)))));
    }

    #[tokio::test]
    async fn test_play_requires_idle_state() {
        let (server, port) = fake_server().await;
        let server_task = tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (_, agent_addr) = server.recv_from(&mut buf).await.unwrap();
            server
                .send_to(b"(init l 1 before_kick_off)", agent_addr)
                .await
                .unwrap();
        });

        let mut config = Config::default_for_team("testers");
        config.host = "127.0.0.1".into();
        config.port = port;
        config.localization.use_particle_filter = false;

        let mut agent = Agent::connect(config).await.unwrap();
        server_task.await.unwrap();

        agent.play(crate::behavior::DemoBehavior).unwrap();
        assert_eq!(agent.state(), AgentState::Playing);

        // a second play on the same instance is a state error
        let err = agent.play(crate::behavior::DemoBehavior).unwrap_err();
        assert!(matches!(err, AgentError::InvalidState(AgentState::Playing)));

        agent.disconnect().await;
        assert_eq!(agent.state(), AgentState::Terminal);

        // terminal agents stay terminal
        let err = agent.play(crate::behavior::DemoBehavior).unwrap_err();
        assert!(matches!(err, AgentError::InvalidState(AgentState::Terminal)));
    }
}

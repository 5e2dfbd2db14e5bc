//! End-to-end session tests against a fake server on the UDP loopback.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use rcss_agent::actions::ActionQueue;
use rcss_agent::agent::{Agent, AgentState};
use rcss_agent::behavior::Behavior;
use rcss_agent::config::Config;
use rcss_agent::world::WorldModel;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Scripted behavior: every think queues a say and two dashes, so a flush
/// must emit the say(s) followed by exactly the last dash.
struct ChattyDasher;

#[async_trait]
impl Behavior for ChattyDasher {
    async fn think(&mut self, _world: &WorldModel, actions: &mut ActionQueue) {
        actions.say("ready");
        actions.dash(30.0);
        actions.dash(50.0);
    }
}

struct FakeServer {
    public: UdpSocket,
    channel: UdpSocket,
    agent_addr: Option<std::net::SocketAddr>,
}

impl FakeServer {
    async fn start() -> Self {
        Self {
            public: UdpSocket::bind("127.0.0.1:0").await.unwrap(),
            channel: UdpSocket::bind("127.0.0.1:0").await.unwrap(),
            agent_addr: None,
        }
    }

    fn port(&self) -> u16 {
        self.public.local_addr().unwrap().port()
    }

    /// Accept the init on the public port and answer from the dedicated
    /// channel socket, as the real server does.
    async fn accept(&mut self, init_reply: &str) -> String {
        let mut buf = [0u8; 1024];
        let (len, agent_addr) = timeout(RECV_TIMEOUT, self.public.recv_from(&mut buf))
            .await
            .expect("no init received")
            .unwrap();
        self.agent_addr = Some(agent_addr);
        self.send(init_reply).await;
        String::from_utf8_lossy(&buf[..len]).to_string()
    }

    async fn send(&self, text: &str) {
        self.channel
            .send_to(text.as_bytes(), self.agent_addr.unwrap())
            .await
            .unwrap();
    }

    async fn recv(&self) -> String {
        let mut buf = [0u8; 1024];
        let (len, _) = timeout(RECV_TIMEOUT, self.channel.recv_from(&mut buf))
            .await
            .expect("no command received")
            .unwrap();
        String::from_utf8_lossy(&buf[..len]).to_string()
    }
}

fn test_config(port: u16) -> Config {
    let mut config = Config::default_for_team("testers");
    config.host = "127.0.0.1".into();
    config.port = port;
    config.localization.use_particle_filter = false;
    config
}

#[tokio::test]
async fn test_full_session_flow() {
    let mut server = FakeServer::start().await;
    let config = test_config(server.port());

    let connect = tokio::spawn(Agent::connect(config));
    let init = server.accept("(init l 7 before_kick_off)").await;
    assert_eq!(init, "(init testers (version 15))");

    let mut agent = connect.await.unwrap().unwrap();
    assert_eq!(agent.state(), AgentState::Idle);
    {
        let world = agent.world().unwrap();
        assert_eq!(world.uniform_number, Some(7));
    }

    agent.play(ChattyDasher).unwrap();
    assert_eq!(agent.state(), AgentState::Playing);

    // one perception (no flush), then the body sense that makes the
    // flush due for the cycle
    server.send("(see 0 ((b) 5 0) ((f c) 10 20))").await;
    server
        .send("(sense_body 0 (stamina 8000 1) (speed 0 0) (head_angle 0))")
        .await;

    // two thinks ran, so two says are queued; the four dashes collapse to
    // the single most recently queued one
    assert_eq!(server.recv().await, "(say ready)");
    assert_eq!(server.recv().await, "(say ready)");
    assert_eq!(server.recv().await, "(dash 50.0000000000)");

    agent.disconnect().await;
    assert_eq!(server.recv().await, "(bye)");
    assert_eq!(agent.state(), AgentState::Terminal);
}

mockall::mock! {
    CountedBehavior {}

    #[async_trait]
    impl Behavior for CountedBehavior {
        async fn on_connect(&mut self, world: &WorldModel, actions: &mut ActionQueue);
        async fn think(&mut self, world: &WorldModel, actions: &mut ActionQueue);
    }
}

#[tokio::test]
async fn test_behavior_invocation_cadence() {
    let mut server = FakeServer::start().await;
    let config = test_config(server.port());

    let connect = tokio::spawn(Agent::connect(config));
    server.accept("(init l 2 before_kick_off)").await;
    let mut agent = connect.await.unwrap().unwrap();

    let (events_tx, events_rx) = std::sync::mpsc::channel::<&'static str>();
    let mut behavior = MockCountedBehavior::new();
    let connect_tx = events_tx.clone();
    behavior
        .expect_on_connect()
        .times(1)
        .returning(move |_, _| {
            connect_tx.send("on_connect").unwrap();
        });
    behavior.expect_think().returning(move |_, _| {
        events_tx.send("think").unwrap();
    });

    agent.play(behavior).unwrap();

    // three dispatched perceptions mean exactly three think invocations,
    // with on_connect once before the first
    for time in 0..3 {
        server.send(&format!("(see {time} ((b) 5 0))")).await;
    }

    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while events.len() < 4 && tokio::time::Instant::now() < deadline {
        match events_rx.try_recv() {
            Ok(event) => events.push(event),
            Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
    assert_eq!(events, vec!["on_connect", "think", "think", "think"]);

    agent.disconnect().await;
}

#[tokio::test]
async fn test_malformed_and_unknown_messages_survive() {
    let mut server = FakeServer::start().await;
    let config = test_config(server.port());

    let connect = tokio::spawn(Agent::connect(config));
    server.accept("(init l 5 before_kick_off)").await;
    let mut agent = connect.await.unwrap().unwrap();
    agent.play(ChattyDasher).unwrap();

    // an unbalanced line and an unknown tag must not kill the receive
    // activity; the following sense_body still produces a flush. the
    // malformed line is dropped before thinking, the unknown tag still
    // counts as a fresh-data cycle, so two thinks queue two says.
    server.send("(see 1 ((b) 5").await;
    server.send("(telepathy 1 hello)").await;
    server.send("(sense_body 1 (stamina 8000 1))").await;

    assert_eq!(server.recv().await, "(say ready)");
    assert_eq!(server.recv().await, "(say ready)");
    assert_eq!(server.recv().await, "(dash 50.0000000000)");

    agent.disconnect().await;
}

#[tokio::test]
async fn test_coach_eye_bypasses_flush_cadence() {
    struct EyeOpener {
        sent: bool,
    }

    #[async_trait]
    impl Behavior for EyeOpener {
        async fn think(&mut self, _world: &WorldModel, actions: &mut ActionQueue) {
            if !self.sent {
                actions.eye(true);
                self.sent = true;
            }
        }
    }

    let mut server = FakeServer::start().await;
    let config = test_config(server.port());

    let connect = tokio::spawn(Agent::connect(config));
    server.accept("(init l ok)").await;
    let mut agent = connect.await.unwrap().unwrap();
    agent.play(EyeOpener { sent: false }).unwrap();

    // no sense_body arrives, yet the eye command goes out immediately
    server.send("(see_global 0 ((b) 0 0 0 0))").await;
    assert_eq!(server.recv().await, "(eye on)");

    agent.disconnect().await;
}

//! Outgoing command queue.
//!
//! Behavior code enqueues typed commands at any point during a think
//! cycle; the agent core flushes once per cycle. Primary commands are
//! mutually exclusive per cycle (last-write-wins), secondary commands all
//! go out in enqueue order. The queue never touches the network; the
//! caller sends what `flush` returns.

/// View cone width for `change_view`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewWidth {
    Narrow,
    Normal,
    Wide,
}

impl ViewWidth {
    pub fn from_tag(tag: &str) -> Option<ViewWidth> {
        match tag {
            "narrow" => Some(ViewWidth::Narrow),
            "normal" => Some(ViewWidth::Normal),
            "wide" => Some(ViewWidth::Wide),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViewWidth::Narrow => "narrow",
            ViewWidth::Normal => "normal",
            ViewWidth::Wide => "wide",
        }
    }
}

/// View detail level for `change_view`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewQuality {
    Low,
    High,
}

impl ViewQuality {
    pub fn from_tag(tag: &str) -> Option<ViewQuality> {
        match tag {
            "low" => Some(ViewQuality::Low),
            "high" => Some(ViewQuality::High),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViewQuality::Low => "low",
            ViewQuality::High => "high",
        }
    }
}

/// A typed server command. Rendered to wire text only at flush time.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Move { x: f64, y: f64 },
    Turn { angle: f64 },
    Dash { power: f64 },
    Kick { power: f64, direction: f64 },
    Catch { direction: f64 },
    Say { message: String },
    TurnNeck { direction: f64 },
    ChangeView { width: ViewWidth, quality: ViewQuality },
    /// Coach only; bypasses the queue discipline entirely.
    Eye { on: bool },
}

impl Command {
    /// Primary commands execute at most once per cycle on the server.
    pub fn is_primary(&self) -> bool {
        matches!(
            self,
            Command::Move { .. }
                | Command::Turn { .. }
                | Command::Dash { .. }
                | Command::Kick { .. }
                | Command::Catch { .. }
        )
    }

    /// The fixed wire template for this command.
    pub fn render(&self) -> String {
        match self {
            Command::Move { x, y } => format!("(move {x:.10} {y:.10})"),
            Command::Turn { angle } => format!("(turn {angle:.10})"),
            Command::Dash { power } => format!("(dash {power:.10})"),
            Command::Kick { power, direction } => format!("(kick {power:.10} {direction:.10})"),
            Command::Catch { direction } => format!("(catch {direction:.10})"),
            Command::Say { message } => format!("(say {message})"),
            Command::TurnNeck { direction } => format!("(turn_neck {direction:.10})"),
            Command::ChangeView { width, quality } => {
                format!("(change_view {} {})", width.as_str(), quality.as_str())
            }
            Command::Eye { on } => format!("(eye {})", if *on { "on" } else { "off" }),
        }
    }
}

/// The per-cycle outgoing command buffer.
#[derive(Debug, Default)]
pub struct ActionQueue {
    queued: Vec<Command>,
    immediate: Vec<Command>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Teleport to a field position; legal only at dead-ball phases.
    pub fn move_to(&mut self, x: f64, y: f64) {
        self.queued.push(Command::Move { x, y });
    }

    /// Turn the body by a relative angle in [-180, 180] degrees.
    ///
    /// An out-of-range angle is a caller bug, not a runtime condition, so
    /// it fails loudly instead of being clamped into silence.
    pub fn turn(&mut self, angle: f64) {
        assert!(
            (-180.0..=180.0).contains(&angle),
            "turn angle out of range [-180, 180]: {angle}"
        );
        self.queued.push(Command::Turn { angle });
    }

    /// Accelerate along the current body facing.
    pub fn dash(&mut self, power: f64) {
        self.queued.push(Command::Dash { power });
    }

    /// Kick the ball with some power in a body-relative direction.
    pub fn kick(&mut self, power: f64, direction: f64) {
        self.queued.push(Command::Kick { power, direction });
    }

    /// Goalie catch attempt in a body-relative direction.
    pub fn catch(&mut self, direction: f64) {
        self.queued.push(Command::Catch { direction });
    }

    /// Broadcast a message to nearby players.
    pub fn say(&mut self, message: impl Into<String>) {
        self.queued.push(Command::Say {
            message: message.into(),
        });
    }

    /// Rotate the neck relative to its current angle.
    pub fn turn_neck(&mut self, direction: f64) {
        self.queued.push(Command::TurnNeck { direction });
    }

    /// Reconfigure the view cone.
    pub fn change_view(&mut self, width: ViewWidth, quality: ViewQuality) {
        self.queued.push(Command::ChangeView { width, quality });
    }

    /// Coach visual feed toggle; drained every cycle regardless of the
    /// flush cadence.
    pub fn eye(&mut self, on: bool) {
        self.immediate.push(Command::Eye { on });
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty() && self.immediate.is_empty()
    }

    /// Drain the queue into the cycle's wire batch: every secondary in
    /// enqueue order, then the most recently queued primary. Earlier
    /// primaries are discarded (last-write-wins).
    pub fn flush(&mut self) -> Vec<Command> {
        let mut batch = Vec::new();
        let mut primary = None;
        for cmd in self.queued.drain(..) {
            if cmd.is_primary() {
                primary = Some(cmd);
            } else {
                batch.push(cmd);
            }
        }
        if let Some(cmd) = primary {
            batch.push(cmd);
        }
        batch
    }

    /// Drain the immediate-send side channel.
    pub fn take_immediate(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.immediate)
    }
}

//! The aggregate world model: everything the agent believes about the
//! match, rebuilt from perception messages and read by the behavior layer.
//!
//! The model is plain data plus update entry points. It is owned and
//! mutated exclusively by the receive task; the think task only ever sees
//! cloned snapshots, so no field here needs interior synchronization.

use std::collections::VecDeque;

use tracing::debug;

use crate::actions::{Command, ViewQuality, ViewWidth};
use crate::geometry::normalize_angle;
use crate::localization::{triangulate, ParticleFilter, Pose};
use crate::objects::{Ball, Flag, Goal, Line, PlayerInfo, SeenSnapshot, Side};
use crate::params::{PlayerType, ServerParams};

/// Inter-agent audio ring capacity; older messages fall off the back.
pub const TEAM_MESSAGE_CAPACITY: usize = 5;

/// Players per side, fixing the persistent roster dimensions.
pub const TEAM_SIZE: usize = 11;

/// Referee-controlled global game state. Set exclusively by referee
/// messages; everything else only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayMode {
    BeforeKickOff,
    PlayOn,
    TimeOver,
    KickOffL,
    KickOffR,
    KickInL,
    KickInR,
    FreeKickL,
    FreeKickR,
    CornerKickL,
    CornerKickR,
    GoalKickL,
    GoalKickR,
    DropBall,
    OffsideL,
    OffsideR,
}

impl PlayMode {
    pub fn from_tag(tag: &str) -> Option<PlayMode> {
        let mode = match tag {
            "before_kick_off" => PlayMode::BeforeKickOff,
            "play_on" => PlayMode::PlayOn,
            "time_over" => PlayMode::TimeOver,
            "kick_off_l" => PlayMode::KickOffL,
            "kick_off_r" => PlayMode::KickOffR,
            "kick_in_l" => PlayMode::KickInL,
            "kick_in_r" => PlayMode::KickInR,
            "free_kick_l" => PlayMode::FreeKickL,
            "free_kick_r" => PlayMode::FreeKickR,
            "corner_kick_l" => PlayMode::CornerKickL,
            "corner_kick_r" => PlayMode::CornerKickR,
            "goal_kick_l" => PlayMode::GoalKickL,
            "goal_kick_r" => PlayMode::GoalKickR,
            "drop_ball" => PlayMode::DropBall,
            "offside_l" => PlayMode::OffsideL,
            "offside_r" => PlayMode::OffsideR,
            _ => return None,
        };
        Some(mode)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlayMode::BeforeKickOff => "before_kick_off",
            PlayMode::PlayOn => "play_on",
            PlayMode::TimeOver => "time_over",
            PlayMode::KickOffL => "kick_off_l",
            PlayMode::KickOffR => "kick_off_r",
            PlayMode::KickInL => "kick_in_l",
            PlayMode::KickInR => "kick_in_r",
            PlayMode::FreeKickL => "free_kick_l",
            PlayMode::FreeKickR => "free_kick_r",
            PlayMode::CornerKickL => "corner_kick_l",
            PlayMode::CornerKickR => "corner_kick_r",
            PlayMode::GoalKickL => "goal_kick_l",
            PlayMode::GoalKickR => "goal_kick_r",
            PlayMode::DropBall => "drop_ball",
            PlayMode::OffsideL => "offside_l",
            PlayMode::OffsideR => "offside_r",
        }
    }
}

/// One heard message from a teammate or the coach.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamMessage {
    pub time: i64,
    pub sender: String,
    pub content: String,
}

/// Per-action counters reported by `sense_body`; a counter that fails to
/// advance after a flush reveals a lost command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionCounts {
    pub kick_count: Option<i64>,
    pub dash_count: Option<i64>,
    pub turn_count: Option<i64>,
    pub say_count: Option<i64>,
    pub turn_neck_count: Option<i64>,
    pub catch_count: Option<i64>,
    pub move_count: Option<i64>,
    pub change_view_count: Option<i64>,
}

/// Last-known sighting of every player, by membership and uniform number.
///
/// Update-on-sight: a slot is overwritten whenever the player is
/// identified in a perception, and otherwise keeps its stale value.
#[derive(Debug, Clone)]
pub struct Roster {
    friends: [Option<PlayerInfo>; TEAM_SIZE],
    foes: [Option<PlayerInfo>; TEAM_SIZE],
}

impl Default for Roster {
    fn default() -> Self {
        Self {
            friends: std::array::from_fn(|_| None),
            foes: std::array::from_fn(|_| None),
        }
    }
}

impl Roster {
    /// Merge one sighting. Players without both a side and a uniform
    /// number cannot be attributed and are skipped.
    pub fn record_sighting(&mut self, player: &PlayerInfo, own_side: Side) {
        let (Some(side), Some(number)) = (player.side, player.uniform_number) else {
            return;
        };
        if number < 1 || number as usize > TEAM_SIZE {
            return;
        }
        let slot = (number - 1) as usize;
        if side == own_side {
            self.friends[slot] = Some(player.clone());
        } else {
            self.foes[slot] = Some(player.clone());
        }
    }

    pub fn friend(&self, uniform_number: u8) -> Option<&PlayerInfo> {
        self.friends.get(uniform_number.checked_sub(1)? as usize)?.as_ref()
    }

    pub fn foe(&self, uniform_number: u8) -> Option<&PlayerInfo> {
        self.foes.get(uniform_number.checked_sub(1)? as usize)?.as_ref()
    }
}

/// The model of the world as known from current and past data.
#[derive(Debug, Clone)]
pub struct WorldModel {
    pub team_name: String,
    pub side: Option<Side>,
    pub uniform_number: Option<u8>,
    pub play_mode: PlayMode,
    pub score_left: u32,
    pub score_right: u32,
    pub sim_time: Option<i64>,

    // latest perception snapshot, replaced wholesale each cycle
    pub ball: Option<Ball>,
    pub flags: Vec<Flag>,
    pub goals: Vec<Goal>,
    pub players: Vec<PlayerInfo>,
    pub lines: Vec<Line>,
    pub roster: Roster,

    // body state from sense_body
    pub view_width: Option<ViewWidth>,
    pub view_quality: Option<ViewQuality>,
    pub stamina: Option<f64>,
    pub effort: Option<f64>,
    pub speed_amount: Option<f64>,
    pub speed_direction: Option<f64>,
    pub neck_direction: Option<f64>,
    pub counts: ActionCounts,

    // localization output; pose heading is the body facing
    pub pose: Option<Pose>,
    pub abs_neck_dir: Option<f64>,

    pub team_messages: VecDeque<TeamMessage>,
    pub last_referee_event: Option<String>,
    pub last_server_error: Option<String>,

    pub params: ServerParams,
    pub player_types: Vec<PlayerType>,

    filter: Option<ParticleFilter>,
}

impl WorldModel {
    /// A model that localizes by triangulation only.
    pub fn new(team_name: impl Into<String>) -> Self {
        Self {
            team_name: team_name.into(),
            side: None,
            uniform_number: None,
            play_mode: PlayMode::BeforeKickOff,
            score_left: 0,
            score_right: 0,
            sim_time: None,
            ball: None,
            flags: Vec::new(),
            goals: Vec::new(),
            players: Vec::new(),
            lines: Vec::new(),
            roster: Roster::default(),
            view_width: None,
            view_quality: None,
            stamina: None,
            effort: None,
            speed_amount: None,
            speed_direction: None,
            neck_direction: None,
            counts: ActionCounts::default(),
            pose: None,
            abs_neck_dir: None,
            team_messages: VecDeque::new(),
            last_referee_event: None,
            last_server_error: None,
            params: ServerParams::default(),
            player_types: Vec::new(),
            filter: None,
        }
    }

    /// A model that localizes with a particle filter seeded uniformly over
    /// the field (the starting pose is unknown until perceptions arrive).
    pub fn with_particle_filter(team_name: impl Into<String>, particles: usize) -> Self {
        let mut model = Self::new(team_name);
        model.filter = Some(ParticleFilter::uniform(particles));
        model
    }

    pub fn has_particle_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Replace the perception snapshot and re-localize.
    pub fn process_see(&mut self, snapshot: SeenSnapshot, sim_time: i64) {
        self.ball = snapshot.ball;
        self.flags = snapshot.flags;
        self.goals = snapshot.goals;
        self.players = snapshot.players;
        self.lines = snapshot.lines;
        self.sim_time = Some(sim_time);

        if let Some(own_side) = self.side {
            for i in 0..self.players.len() {
                let player = self.players[i].clone();
                self.roster.record_sighting(&player, own_side);
            }
        }

        self.localize();
    }

    fn localize(&mut self) {
        if self.filter.is_some() {
            // nearest usable flag carries the most information per meter
            // of range noise
            let nearest = self
                .flags
                .iter()
                .filter(|f| f.usable())
                .filter_map(|f| Some((f.distance?, f.coords()?)))
                .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let filter = self.filter.as_mut().unwrap();
            if let Some((distance, coords)) = nearest {
                filter.observe(distance, coords);
            }
            let estimate = filter.estimate();
            self.abs_neck_dir = self
                .neck_direction
                .map(|n| normalize_angle(estimate.heading + n));
            self.pose = Some(estimate);
        } else {
            match triangulate(&self.flags) {
                Some(view_pose) => {
                    // triangulation recovers the view (neck) facing; the
                    // body facing differs by the relative neck angle
                    self.abs_neck_dir = Some(view_pose.heading);
                    let body_heading = match self.neck_direction {
                        Some(neck) => normalize_angle(view_pose.heading - neck),
                        None => view_pose.heading,
                    };
                    self.pose = Some(Pose::new(view_pose.x, view_pose.y, body_heading));
                }
                None => {
                    debug!("not enough usable flags to localize this cycle");
                    self.pose = None;
                    self.abs_neck_dir = None;
                }
            }
        }
    }

    /// Open-loop motion feedback from an issued primary command.
    pub fn apply_motion(&mut self, command: &Command) {
        let max_power = self.params.maxpower;
        let Some(filter) = self.filter.as_mut() else {
            return;
        };
        match *command {
            Command::Dash { power } => filter.predict_dash(power, max_power),
            Command::Turn { angle } => filter.predict_turn(angle),
            Command::Move { x, y } => filter.collapse_to(x, y),
            _ => {}
        }
        if self.pose.is_some() {
            self.pose = Some(self.filter.as_ref().unwrap().estimate());
        }
    }

    /// Push a heard message onto the fixed-capacity ring, newest first.
    pub fn record_team_message(&mut self, message: TeamMessage) {
        self.team_messages.push_front(message);
        self.team_messages.truncate(TEAM_MESSAGE_CAPACITY);
    }

    /// Scores are set to the server-reported absolute value, never
    /// incremented, so they cannot drift.
    pub fn set_score(&mut self, side: Side, goals: u32) {
        match side {
            Side::Left => self.score_left = goals,
            Side::Right => self.score_right = goals,
        }
    }

    pub fn our_score(&self) -> u32 {
        match self.side {
            Some(Side::Right) => self.score_right,
            _ => self.score_left,
        }
    }

    pub fn their_score(&self) -> u32 {
        match self.side {
            Some(Side::Right) => self.score_left,
            _ => self.score_right,
        }
    }

    /// Absolute coordinates of an object seen at the given range and
    /// body-relative bearing, if we know our own pose.
    pub fn object_absolute_coords(&self, distance: f64, bearing: f64) -> Option<(f64, f64)> {
        let pose = self.pose?;
        let absolute = (pose.heading + bearing).to_radians();
        Some((
            pose.x + distance * absolute.cos(),
            pose.y + distance * absolute.sin(),
        ))
    }

    /// Whether the ball is within the kickable margin.
    pub fn is_ball_kickable(&self) -> bool {
        self.ball
            .as_ref()
            .and_then(|b| b.distance)
            .map(|d| d <= self.params.kickable_margin)
            .unwrap_or(false)
    }

    pub fn is_before_kick_off(&self) -> bool {
        self.play_mode == PlayMode::BeforeKickOff
    }

    pub fn is_kick_off_us(&self) -> bool {
        let first_cycle = self.sim_time.unwrap_or(0) == 0;
        (first_cycle && self.side == Some(Side::Left))
            || self.mode_is_ours(PlayMode::KickOffL, PlayMode::KickOffR)
    }

    pub fn is_kick_in_us(&self) -> bool {
        self.mode_is_ours(PlayMode::KickInL, PlayMode::KickInR)
    }

    pub fn is_free_kick_us(&self) -> bool {
        self.mode_is_ours(PlayMode::FreeKickL, PlayMode::FreeKickR)
    }

    pub fn is_corner_kick_us(&self) -> bool {
        self.mode_is_ours(PlayMode::CornerKickL, PlayMode::CornerKickR)
    }

    pub fn is_goal_kick_us(&self) -> bool {
        self.mode_is_ours(PlayMode::GoalKickL, PlayMode::GoalKickR)
    }

    /// Whether the opposition holds a dead-ball restart (kick-in, free
    /// kick, or corner).
    pub fn is_dead_ball_them(&self) -> bool {
        let theirs = match self.side {
            Some(Side::Left) => [PlayMode::KickInR, PlayMode::FreeKickR, PlayMode::CornerKickR],
            _ => [PlayMode::KickInL, PlayMode::FreeKickL, PlayMode::CornerKickL],
        };
        theirs.contains(&self.play_mode)
    }

    fn mode_is_ours(&self, left: PlayMode, right: PlayMode) -> bool {
        match self.side {
            Some(Side::Left) => self.play_mode == left,
            Some(Side::Right) => self.play_mode == right,
            None => false,
        }
    }
}

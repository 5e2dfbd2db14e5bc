//! Routes parsed server messages into world-model updates.
//!
//! One closed tag enumeration, one `match`, one handler per tag. Unknown
//! tags surface as a recoverable error: the receive loop logs them and
//! keeps the connection alive.

use tracing::{debug, error, info, warn};

use crate::objects::{Ball, Flag, Goal, Line, PlayerInfo, SeenSnapshot, Side};
use crate::params::PlayerType;
use crate::sexpr::Expr;
use crate::world::{PlayMode, TeamMessage, WorldModel};

/// Every message tag the server can open an expression with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    See,
    Hear,
    SenseBody,
    Init,
    Error,
    Warning,
    PlayerType,
    PlayerParam,
    ServerParam,
    Ok,
    SeeGlobal,
}

impl MessageType {
    pub fn from_tag(tag: &str) -> Option<MessageType> {
        let mtype = match tag {
            "see" => MessageType::See,
            "hear" => MessageType::Hear,
            "sense_body" => MessageType::SenseBody,
            "init" => MessageType::Init,
            "error" => MessageType::Error,
            "warning" => MessageType::Warning,
            "player_type" => MessageType::PlayerType,
            "player_param" => MessageType::PlayerParam,
            "server_param" => MessageType::ServerParam,
            "ok" => MessageType::Ok,
            "see_global" => MessageType::SeeGlobal,
            _ => return None,
        };
        Some(mtype)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),
    #[error("malformed {0} message")]
    Malformed(&'static str),
}

/// Route one parsed expression to its handler. Returns the message type
/// so the caller can key cycle bookkeeping (a send flush is due after
/// every `sense_body`).
pub fn dispatch(wm: &mut WorldModel, expr: &Expr) -> Result<MessageType, DispatchError> {
    let items = expr.list().ok_or(DispatchError::Malformed("top-level"))?;
    let tag = items
        .first()
        .and_then(Expr::atom)
        .ok_or(DispatchError::Malformed("top-level"))?;
    let mtype = MessageType::from_tag(tag)
        .ok_or_else(|| DispatchError::UnknownMessageType(tag.to_string()))?;

    match mtype {
        MessageType::See | MessageType::SeeGlobal => handle_see(wm, items)?,
        MessageType::Hear => handle_hear(wm, items)?,
        MessageType::SenseBody => handle_sense_body(wm, items)?,
        MessageType::Init => handle_init(wm, items)?,
        MessageType::Error => handle_error(wm, items),
        MessageType::Warning => handle_warning(items),
        MessageType::PlayerType => handle_player_type(wm, items),
        MessageType::PlayerParam => {
            debug!("player_param received, not tracked");
        }
        MessageType::ServerParam => handle_server_param(wm, items),
        MessageType::Ok => {
            info!("server acknowledged a command");
        }
    }
    Ok(mtype)
}

/// Strip the double quotes the parser keeps around string literals.
fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

/// Optional fields carried by an observed object, decoded by field count:
/// 1 field is bearing only; >=2 adds distance; >=4 the rate-of-change
/// pair; >=6 the body/neck angles of a seen player.
#[derive(Default)]
struct ObjectFields {
    distance: Option<f64>,
    bearing: Option<f64>,
    dist_change: Option<f64>,
    dir_change: Option<f64>,
    body_dir: Option<f64>,
    neck_dir: Option<f64>,
}

fn decode_fields(members: &[Expr]) -> ObjectFields {
    let mut fields = ObjectFields::default();
    if members.len() == 1 {
        fields.bearing = members[0].as_f64();
    } else if members.len() >= 2 {
        fields.distance = members[0].as_f64();
        fields.bearing = members[1].as_f64();
        if members.len() >= 4 {
            fields.dist_change = members[2].as_f64();
            fields.dir_change = members[3].as_f64();
        }
        if members.len() >= 6 {
            fields.body_dir = members[4].as_f64();
            fields.neck_dir = members[5].as_f64();
        }
    }
    fields
}

fn handle_see(wm: &mut WorldModel, items: &[Expr]) -> Result<(), DispatchError> {
    let sim_time = items
        .get(1)
        .and_then(Expr::as_i64)
        .ok_or(DispatchError::Malformed("see"))?;

    let mut snapshot = SeenSnapshot::default();
    for obj in &items[2..] {
        let Some(parts) = obj.list() else {
            warn!("see object is not a list, skipping");
            continue;
        };
        let Some(name) = parts.first().and_then(Expr::list) else {
            warn!("see object without a name, skipping");
            continue;
        };
        let marker = name.first().and_then(Expr::atom).unwrap_or("");
        let fields = decode_fields(&parts[1..]);

        match marker {
            "f" => {
                // the flag id is the name atoms after the marker, joined
                let id: String = name[1..]
                    .iter()
                    .filter_map(Expr::atom)
                    .collect::<Vec<_>>()
                    .join("");
                snapshot.flags.push(Flag {
                    id: Some(id),
                    distance: fields.distance,
                    bearing: fields.bearing,
                });
            }
            "g" => {
                let side = name.get(1).and_then(Expr::atom).and_then(Side::from_tag);
                snapshot.goals.push(Goal {
                    side,
                    distance: fields.distance,
                    bearing: fields.bearing,
                });
            }
            "l" => {
                let id = name.get(1).and_then(Expr::atom).map(str::to_string);
                snapshot.lines.push(Line {
                    id,
                    distance: fields.distance,
                    bearing: fields.bearing,
                });
            }
            "b" => {
                snapshot.ball = Some(Ball {
                    distance: fields.distance,
                    bearing: fields.bearing,
                    dist_change: fields.dist_change,
                    dir_change: fields.dir_change,
                });
            }
            "p" => {
                let team_name = name.get(1).and_then(Expr::atom).map(unquote).map(str::to_string);
                let uniform_number = name
                    .get(2)
                    .and_then(Expr::as_i64)
                    .and_then(|n| u8::try_from(n).ok());
                // a player on our team is on our side, anyone else on the
                // opposite one
                let side = match (&team_name, wm.side) {
                    (Some(team), Some(own_side)) => {
                        if *team == wm.team_name {
                            Some(own_side)
                        } else {
                            Some(own_side.opposite())
                        }
                    }
                    _ => None,
                };
                snapshot.players.push(PlayerInfo {
                    distance: fields.distance,
                    bearing: fields.bearing,
                    dist_change: fields.dist_change,
                    dir_change: fields.dir_change,
                    team_name,
                    side,
                    uniform_number,
                    body_dir: fields.body_dir,
                    neck_dir: fields.neck_dir,
                });
            }
            // objects close enough to sense but out of the view cone
            // arrive as bare capitalized markers with no measurements
            "B" => snapshot.ball = Some(Ball::default()),
            "F" => snapshot.flags.push(Flag::default()),
            "G" => snapshot.goals.push(Goal::default()),
            "P" => snapshot.players.push(PlayerInfo::default()),
            other => {
                warn!(marker = %other, "unknown see object marker, skipping");
            }
        }
    }

    wm.process_see(snapshot, sim_time);
    Ok(())
}

fn handle_hear(wm: &mut WorldModel, items: &[Expr]) -> Result<(), DispatchError> {
    let time = items
        .get(1)
        .and_then(Expr::as_i64)
        .ok_or(DispatchError::Malformed("hear"))?;
    let sender = items
        .get(2)
        .and_then(Expr::atom)
        .ok_or(DispatchError::Malformed("hear"))?;
    let message = items
        .get(3)
        .and_then(Expr::atom)
        .ok_or(DispatchError::Malformed("hear"))?;

    // our own shouts echo back; nobody wants those
    if sender == "self" {
        return Ok(());
    }

    if sender == "referee" {
        // goal announcements carry the absolute score after the rightmost
        // underscore; setting (never incrementing) precludes drift
        if let Some(count) = message.strip_prefix("goal_l_") {
            if let Ok(goals) = count.parse() {
                wm.set_score(Side::Left, goals);
            }
            return Ok(());
        }
        if let Some(count) = message.strip_prefix("goal_r_") {
            if let Ok(goals) = count.parse() {
                wm.set_score(Side::Right, goals);
            }
            return Ok(());
        }

        match PlayMode::from_tag(message) {
            Some(mode) => wm.play_mode = mode,
            None => {
                // fouls, goalie catches, half_time and friends: referee
                // announcements that change no mode but may interest the
                // behavior layer
                wm.last_referee_event = Some(message.to_string());
            }
        }
        return Ok(());
    }

    let content = items[3..]
        .iter()
        .filter_map(Expr::atom)
        .map(unquote)
        .collect::<Vec<_>>()
        .join(" ");
    wm.record_team_message(TeamMessage {
        time,
        sender: sender.to_string(),
        content,
    });
    Ok(())
}

fn handle_sense_body(wm: &mut WorldModel, items: &[Expr]) -> Result<(), DispatchError> {
    let sim_time = items
        .get(1)
        .and_then(Expr::as_i64)
        .ok_or(DispatchError::Malformed("sense_body"))?;
    wm.sim_time = Some(sim_time);

    for info in &items[2..] {
        let Some(parts) = info.list() else { continue };
        let Some(name) = parts.first().and_then(Expr::atom) else {
            continue;
        };
        let values = &parts[1..];
        let first = values.first().and_then(Expr::as_f64);
        let second = values.get(1).and_then(Expr::as_f64);

        match name {
            "view_mode" => {
                wm.view_quality = values
                    .first()
                    .and_then(Expr::atom)
                    .and_then(crate::actions::ViewQuality::from_tag);
                wm.view_width = values
                    .get(1)
                    .and_then(Expr::atom)
                    .and_then(crate::actions::ViewWidth::from_tag);
            }
            "stamina" => {
                wm.stamina = first;
                wm.effort = second;
            }
            "speed" => {
                wm.speed_amount = first;
                wm.speed_direction = second;
            }
            "head_angle" => wm.neck_direction = first,
            "kick" => wm.counts.kick_count = first.map(|v| v as i64),
            "dash" => wm.counts.dash_count = first.map(|v| v as i64),
            "turn" => wm.counts.turn_count = first.map(|v| v as i64),
            "say" => wm.counts.say_count = first.map(|v| v as i64),
            "turn_neck" => wm.counts.turn_neck_count = first.map(|v| v as i64),
            "catch" => wm.counts.catch_count = first.map(|v| v as i64),
            "move" => wm.counts.move_count = first.map(|v| v as i64),
            "change_view" => wm.counts.change_view_count = first.map(|v| v as i64),
            _ => {}
        }
    }
    Ok(())
}

fn handle_init(wm: &mut WorldModel, items: &[Expr]) -> Result<(), DispatchError> {
    let side = items
        .get(1)
        .and_then(Expr::atom)
        .and_then(Side::from_tag)
        .ok_or(DispatchError::Malformed("init"))?;
    wm.side = Some(side);

    // the coach form is (init side ok) with no number or mode
    let second = items.get(2).and_then(Expr::atom);
    if second == Some("ok") {
        info!(side = side.as_str(), "initialized as coach");
        return Ok(());
    }

    wm.uniform_number = items
        .get(2)
        .and_then(Expr::as_i64)
        .and_then(|n| u8::try_from(n).ok());
    if let Some(mode) = items.get(3).and_then(Expr::atom).and_then(PlayMode::from_tag) {
        wm.play_mode = mode;
    }
    info!(
        side = side.as_str(),
        uniform_number = ?wm.uniform_number,
        play_mode = wm.play_mode.as_str(),
        "initialized by server"
    );
    Ok(())
}

fn handle_error(wm: &mut WorldModel, items: &[Expr]) {
    let text = items.get(1).and_then(Expr::atom).unwrap_or("unspecified");
    // the server stays authoritative and playable, so this is loud but
    // not fatal
    error!(error = %text, "server reported an error");
    wm.last_server_error = Some(text.to_string());
}

fn handle_warning(items: &[Expr]) {
    let text = items.get(1).and_then(Expr::atom).unwrap_or("unspecified");
    warn!(warning = %text, "server issued a warning");
}

fn handle_server_param(wm: &mut WorldModel, items: &[Expr]) {
    for param in &items[1..] {
        let Some(pair) = param.list() else { continue };
        if pair.len() != 2 {
            continue;
        }
        let (Some(key), Some(value)) = (pair[0].atom(), pair[1].as_f64()) else {
            continue;
        };
        if !wm.params.set(key, value) {
            debug!(param = %key, "untracked server parameter");
        }
    }
}

fn handle_player_type(wm: &mut WorldModel, items: &[Expr]) {
    let mut player_type = PlayerType::default();
    for param in &items[1..] {
        let Some(pair) = param.list() else { continue };
        if pair.len() != 2 {
            continue;
        }
        if let (Some(key), Some(value)) = (pair[0].atom(), pair[1].as_f64()) {
            player_type.set(key, value);
        }
    }
    wm.player_types.push(player_type);
}

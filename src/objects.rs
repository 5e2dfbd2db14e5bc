//! Observed-object records produced by the `see` parser, plus the
//! compiled-in landmark coordinate table used for self-localization.
//!
//! All records are replaced wholesale each perception cycle; none of them
//! accumulate state. Coordinates are field-absolute, x toward the right
//! goal, y toward the top touchline, origin at the center mark.

/// Team side as assigned by the server at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn from_tag(tag: &str) -> Option<Side> {
        match tag {
            "l" => Some(Side::Left),
            "r" => Some(Side::Right),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "l",
            Side::Right => "r",
        }
    }
}

/// A fixed field marker. Unobservable flags carry no id at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flag {
    pub id: Option<String>,
    pub distance: Option<f64>,
    pub bearing: Option<f64>,
}

impl Flag {
    /// Whether this sighting can feed localization: id known, range and
    /// bearing both measured.
    pub fn usable(&self) -> bool {
        self.id.is_some() && self.distance.is_some() && self.bearing.is_some()
    }

    /// Absolute coordinates of this flag, if its id is known.
    pub fn coords(&self) -> Option<(f64, f64)> {
        self.id.as_deref().and_then(landmark_coords)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ball {
    pub distance: Option<f64>,
    pub bearing: Option<f64>,
    pub dist_change: Option<f64>,
    pub dir_change: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Goal {
    pub side: Option<Side>,
    pub distance: Option<f64>,
    pub bearing: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    pub id: Option<String>,
    pub distance: Option<f64>,
    pub bearing: Option<f64>,
}

/// Another player on the field, as far as we could identify them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerInfo {
    pub distance: Option<f64>,
    pub bearing: Option<f64>,
    pub dist_change: Option<f64>,
    pub dir_change: Option<f64>,
    pub team_name: Option<String>,
    pub side: Option<Side>,
    pub uniform_number: Option<u8>,
    pub body_dir: Option<f64>,
    pub neck_dir: Option<f64>,
}

/// Everything one `see` message reported, ready to replace the world
/// model's per-cycle snapshot.
#[derive(Debug, Clone, Default)]
pub struct SeenSnapshot {
    pub ball: Option<Ball>,
    pub flags: Vec<Flag>,
    pub goals: Vec<Goal>,
    pub players: Vec<PlayerInfo>,
    pub lines: Vec<Line>,
}

/// Half-extent of the playable pitch along x (goal line to center).
pub const PITCH_HALF_LENGTH: f64 = 52.5;
/// Half-extent of the playable pitch along y (touchline to center).
pub const PITCH_HALF_WIDTH: f64 = 34.0;
/// Particle-filter field bound along x; particles beyond it weigh zero.
pub const FIELD_BOUND_X: f64 = 55.0;
/// Particle-filter field bound along y.
pub const FIELD_BOUND_Y: f64 = 35.0;

/// Absolute coordinates for a landmark id (the flag name atoms after the
/// leading marker, joined: `(f t l 50)` is "tl50", `(f g r b)` is "grb").
///
/// The layout is the server's standard field: perimeter rows five meters
/// outside the touchlines, side columns five meters outside the goal
/// lines, penalty-box corners, goal posts, boundary intersections, and the
/// center mark.
pub fn landmark_coords(id: &str) -> Option<(f64, f64)> {
    let coords = match id {
        // top perimeter row
        "tl50" => (-50.0, 39.0),
        "tl40" => (-40.0, 39.0),
        "tl30" => (-30.0, 39.0),
        "tl20" => (-20.0, 39.0),
        "tl10" => (-10.0, 39.0),
        "t0" => (0.0, 39.0),
        "tr10" => (10.0, 39.0),
        "tr20" => (20.0, 39.0),
        "tr30" => (30.0, 39.0),
        "tr40" => (40.0, 39.0),
        "tr50" => (50.0, 39.0),
        // bottom perimeter row
        "bl50" => (-50.0, -39.0),
        "bl40" => (-40.0, -39.0),
        "bl30" => (-30.0, -39.0),
        "bl20" => (-20.0, -39.0),
        "bl10" => (-10.0, -39.0),
        "b0" => (0.0, -39.0),
        "br10" => (10.0, -39.0),
        "br20" => (20.0, -39.0),
        "br30" => (30.0, -39.0),
        "br40" => (40.0, -39.0),
        "br50" => (50.0, -39.0),
        // left side column
        "lt30" => (-57.5, 30.0),
        "lt20" => (-57.5, 20.0),
        "lt10" => (-57.5, 10.0),
        "l0" => (-57.5, 0.0),
        "lb10" => (-57.5, -10.0),
        "lb20" => (-57.5, -20.0),
        "lb30" => (-57.5, -30.0),
        // right side column
        "rt30" => (57.5, 30.0),
        "rt20" => (57.5, 20.0),
        "rt10" => (57.5, 10.0),
        "r0" => (57.5, 0.0),
        "rb10" => (57.5, -10.0),
        "rb20" => (57.5, -20.0),
        "rb30" => (57.5, -30.0),
        // penalty-box corners and centers
        "plt" => (-36.0, 20.16),
        "plc" => (-36.0, 0.0),
        "plb" => (-36.0, -20.16),
        "prt" => (36.0, 20.16),
        "prc" => (36.0, 0.0),
        "prb" => (36.0, -20.16),
        // goal posts
        "glt" => (-PITCH_HALF_LENGTH, 7.01),
        "glb" => (-PITCH_HALF_LENGTH, -7.01),
        "grt" => (PITCH_HALF_LENGTH, 7.01),
        "grb" => (PITCH_HALF_LENGTH, -7.01),
        // goal centers (seen as goal objects, kept here for behaviors)
        "gl" => (-PITCH_HALF_LENGTH, 0.0),
        "gr" => (PITCH_HALF_LENGTH, 0.0),
        // boundary intersections and the center mark
        "lt" => (-PITCH_HALF_LENGTH, PITCH_HALF_WIDTH),
        "ct" => (0.0, PITCH_HALF_WIDTH),
        "rt" => (PITCH_HALF_LENGTH, PITCH_HALF_WIDTH),
        "lb" => (-PITCH_HALF_LENGTH, -PITCH_HALF_WIDTH),
        "cb" => (0.0, -PITCH_HALF_WIDTH),
        "rb" => (PITCH_HALF_LENGTH, -PITCH_HALF_WIDTH),
        "c" => (0.0, 0.0),
        _ => return None,
    };
    Some(coords)
}

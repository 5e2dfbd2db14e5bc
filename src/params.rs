//! Server-reported simulation parameters.
//!
//! The server announces its full parameter set right after init
//! (`server_param`, `player_param`, one `player_type` per heterogeneous
//! type). Only the parameters the runtime and behaviors actually consult
//! are modeled; the rest are ignored at parse time.

/// The subset of `server_param` values the client consumes, with the
/// server's stock defaults so the model is usable before the message
/// arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerParams {
    pub goal_width: f64,
    pub player_speed_max: f64,
    pub stamina_max: f64,
    pub dash_power_rate: f64,
    pub kickable_margin: f64,
    pub maxpower: f64,
    pub minpower: f64,
    pub ball_speed_max: f64,
    pub visible_angle: f64,
    pub catchable_area_l: f64,
}

impl Default for ServerParams {
    fn default() -> Self {
        Self {
            goal_width: 14.02,
            player_speed_max: 1.05,
            stamina_max: 8000.0,
            dash_power_rate: 0.006,
            kickable_margin: 0.7,
            maxpower: 100.0,
            minpower: -100.0,
            ball_speed_max: 3.0,
            visible_angle: 90.0,
            catchable_area_l: 1.2,
        }
    }
}

impl ServerParams {
    /// Apply one key/value pair from a `server_param` message. Returns
    /// false for keys this model does not track.
    pub fn set(&mut self, key: &str, value: f64) -> bool {
        match key {
            "goal_width" => self.goal_width = value,
            "player_speed_max" => self.player_speed_max = value,
            "stamina_max" => self.stamina_max = value,
            "dash_power_rate" => self.dash_power_rate = value,
            "kickable_margin" => self.kickable_margin = value,
            "maxpower" => self.maxpower = value,
            "minpower" => self.minpower = value,
            "ball_speed_max" => self.ball_speed_max = value,
            "visible_angle" => self.visible_angle = value,
            "catchable_area_l" => self.catchable_area_l = value,
            _ => return false,
        }
        true
    }
}

/// One heterogeneous player type, e.g.
/// `(player_type (id 3) (player_speed_max 1.05) (stamina_inc_max 45.2) ...)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerType {
    pub id: Option<i64>,
    pub player_speed_max: Option<f64>,
    pub stamina_inc_max: Option<f64>,
    pub player_decay: Option<f64>,
    pub inertia_moment: Option<f64>,
    pub dash_power_rate: Option<f64>,
    pub player_size: Option<f64>,
    pub kickable_margin: Option<f64>,
    pub kick_rand: Option<f64>,
    pub extra_stamina: Option<f64>,
    pub effort_max: Option<f64>,
    pub effort_min: Option<f64>,
}

impl PlayerType {
    /// Apply one key/value pair from a `player_type` message.
    pub fn set(&mut self, key: &str, value: f64) {
        match key {
            "id" => self.id = Some(value as i64),
            "player_speed_max" => self.player_speed_max = Some(value),
            "stamina_inc_max" => self.stamina_inc_max = Some(value),
            "player_decay" => self.player_decay = Some(value),
            "inertia_moment" => self.inertia_moment = Some(value),
            "dash_power_rate" => self.dash_power_rate = Some(value),
            "player_size" => self.player_size = Some(value),
            "kickable_margin" => self.kickable_margin = Some(value),
            "kick_rand" => self.kick_rand = Some(value),
            "extra_stamina" => self.extra_stamina = Some(value),
            "effort_max" => self.effort_max = Some(value),
            "effort_min" => self.effort_min = Some(value),
            _ => {}
        }
    }
}

//! Goal message codec
//!
//! The planning host sends one goal per line:
//!
//! ```text
//! x:<f64>,y:<f64>,o:<f64>,dt:<f64>,t_max:<f64>
//! ```
//!
//! Fields are read by position. In [`DecodeMode::Positional`] the label in
//! front of each `:` is not checked, so `a:1,b:2,c:3,d:0.1,e:1` decodes the
//! same as the canonical form. [`DecodeMode::Strict`] additionally requires
//! each label to match its position.

use crate::error::{Error, Result};
use crate::trajectory::Pose;
use std::fmt;
use std::str::FromStr;

/// Field labels in wire order
pub const FIELD_LABELS: [&str; 5] = ["x", "y", "o", "dt", "t_max"];

/// Label checking policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Trust field order, ignore labels
    #[default]
    Positional,
    /// Require labels to match `FIELD_LABELS` in order
    Strict,
}

/// Target pose and timing budget sent by the planning host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalMessage {
    pub x: f64,
    pub y: f64,
    /// Orientation (rad)
    pub o: f64,
    /// Requested sampling interval (s)
    pub dt_request: f64,
    /// Time horizon (s), always > 0
    pub t_max: f64,
}

impl GoalMessage {
    /// Goal pose handed to the trajectory generator
    pub fn pose(&self) -> Pose {
        Pose::new(self.x, self.y, self.o)
    }
}

/// Decode a goal message trusting field positions
pub fn decode(raw: &str) -> Result<GoalMessage> {
    decode_with(raw, DecodeMode::Positional)
}

/// Decode a goal message with an explicit label policy
pub fn decode_with(raw: &str, mode: DecodeMode) -> Result<GoalMessage> {
    let fields: Vec<&str> = raw.trim().split(',').collect();
    if fields.len() != FIELD_LABELS.len() {
        return Err(Error::MalformedMessage(format!(
            "expected {} fields, got {}",
            FIELD_LABELS.len(),
            fields.len()
        )));
    }

    let mut values = [0.0f64; 5];
    for (i, (field, expected)) in fields.iter().zip(FIELD_LABELS).enumerate() {
        let Some((label, value)) = field.rsplit_once(':') else {
            return Err(Error::MalformedMessage(format!(
                "field {} ('{}') has no ':' separator",
                i, field
            )));
        };

        if mode == DecodeMode::Strict {
            // Everything before the first ':' is the label
            let label = label.split(':').next().unwrap_or(label).trim();
            if label != expected {
                return Err(Error::MalformedMessage(format!(
                    "field {} labelled '{}', expected '{}'",
                    i, label, expected
                )));
            }
        }

        values[i] = parse_value(value, expected)?;
    }

    let [x, y, o, dt_request, t_max] = values;
    if t_max <= 0.0 {
        return Err(Error::MalformedMessage(format!(
            "t_max must be positive, got {}",
            t_max
        )));
    }

    Ok(GoalMessage {
        x,
        y,
        o,
        dt_request,
        t_max,
    })
}

fn parse_value(value: &str, field: &str) -> Result<f64> {
    let value = value.trim();
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(Error::MalformedMessage(format!(
            "{} value '{}' is not a finite number",
            field, value
        ))),
    }
}

impl FromStr for GoalMessage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        decode(s)
    }
}

impl fmt::Display for GoalMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x:{},y:{},o:{},dt:{},t_max:{}",
            self.x, self.y, self.o, self.dt_request, self.t_max
        )
    }
}

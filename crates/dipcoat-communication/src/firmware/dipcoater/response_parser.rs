//! Dip coater response parser
//!
//! Classifies each line printed by the firmware. The firmware speaks Spanish
//! and is not consistent about case or accents, so matching runs on a folded
//! copy of the line (lower case, accents removed).
//!
//! Matchers are tried in a fixed order and the first hit wins:
//! mode, home, limit, position, emergency, error, movement, status. Anything
//! else is a plain message. Decoding never fails: a line that looks like a
//! known shape but carries an unusable payload is logged and falls through.

use chrono::{DateTime, Utc};
use dipcoat_core::{
    Axis, DeviceMode, EventKind, HomeStatus, LimitSide, ParsedEvent, ProtocolError,
    StatusSnapshot,
};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static MODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bmodo\s+(manual|automatico|homing|home)\b").expect("invalid mode regex")
});

static HOME_FOUND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bhome\s+([yz])\s+encontrado\b").expect("invalid home regex")
});

static HOME_SEARCHING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bbuscando\s+home\s+([yz])\b|\bhome\s+([yz])\s+buscando\b")
        .expect("invalid home regex")
});

static HOME_COMPLETE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bsecuencia\s+home\s+completada\b").expect("invalid home regex")
});

static LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\blimite\s+([yz])\s+(min|max)\s+alcanzado\b").expect("invalid limit regex")
});

static POSITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([yz])\s*:\s*(-?\d+)").expect("invalid position regex")
});

static ERROR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)error:\s*(.*)$").expect("invalid error regex"));

static MOVING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bmoviendo\s+([yz])\b").expect("invalid movement regex"));

static INTERRUPTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bmovimiento\s+([yz])\s+interrumpido\b").expect("invalid movement regex")
});

/// Decode one trimmed line received now
pub fn decode(line: &str) -> ParsedEvent {
    decode_at(line, Utc::now())
}

/// Decode one trimmed line with an explicit receipt time
pub fn decode_at(line: &str, received_at: DateTime<Utc>) -> ParsedEvent {
    ParsedEvent::at(classify(line), line, received_at)
}

/// Classify a line without wrapping it in an event
pub fn classify(line: &str) -> EventKind {
    let folded = fold(line);

    match_mode(&folded)
        .or_else(|| match_home(&folded))
        .or_else(|| match_limit(&folded))
        .or_else(|| match_position(line, &folded))
        .or_else(|| match_emergency(&folded))
        .or_else(|| match_error(line))
        .or_else(|| match_movement(&folded))
        .or_else(|| match_status(line))
        .unwrap_or(EventKind::Message)
}

/// Lower-case `line` and strip the accents the firmware may or may not print
fn fold(line: &str) -> String {
    line.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            other => other,
        })
        .collect()
}

fn axis_from(capture: &str) -> Option<Axis> {
    capture.chars().next().and_then(Axis::from_letter)
}

fn anomaly(line: &str, reason: impl Into<String>) {
    let err = ProtocolError::DecodeAnomaly {
        line: line.to_string(),
        reason: reason.into(),
    };
    tracing::debug!("{}", err);
}

fn match_mode(folded: &str) -> Option<EventKind> {
    let caps = MODE_RE.captures(folded)?;
    let mode = match &caps[1] {
        "manual" => DeviceMode::Manual,
        "automatico" => DeviceMode::Automatic,
        _ => DeviceMode::Homing,
    };
    Some(EventKind::Mode { mode })
}

fn match_home(folded: &str) -> Option<EventKind> {
    if HOME_COMPLETE_RE.is_match(folded) {
        return Some(EventKind::Home {
            axis: None,
            status: HomeStatus::Complete,
        });
    }

    if let Some(caps) = HOME_FOUND_RE.captures(folded) {
        return Some(EventKind::Home {
            axis: axis_from(&caps[1]),
            status: HomeStatus::Found,
        });
    }

    let caps = HOME_SEARCHING_RE.captures(folded)?;
    let letter = caps.get(1).or_else(|| caps.get(2))?;
    Some(EventKind::Home {
        axis: axis_from(letter.as_str()),
        status: HomeStatus::Searching,
    })
}

fn match_limit(folded: &str) -> Option<EventKind> {
    let caps = LIMIT_RE.captures(folded)?;
    let side = if &caps[2] == "min" {
        LimitSide::Min
    } else {
        LimitSide::Max
    };
    Some(EventKind::Limit {
        axis: axis_from(&caps[1])?,
        side,
    })
}

fn match_position(line: &str, folded: &str) -> Option<EventKind> {
    let caps = POSITION_RE.captures(folded)?;
    let axis = axis_from(&caps[1])?;
    match caps[2].parse::<i64>() {
        Ok(position) => Some(EventKind::Position { axis, position }),
        Err(e) => {
            anomaly(line, format!("position out of range: {}", e));
            None
        }
    }
}

fn match_emergency(folded: &str) -> Option<EventKind> {
    // DESACTIVADO contains ACTIVADO, so it has to be tested first.
    if folded.contains("paro de emergencia desactivado") {
        Some(EventKind::Emergency { active: false })
    } else if folded.contains("paro de emergencia activado") {
        Some(EventKind::Emergency { active: true })
    } else {
        None
    }
}

fn match_error(line: &str) -> Option<EventKind> {
    let caps = ERROR_RE.captures(line)?;
    Some(EventKind::Error {
        message: caps[1].trim().to_string(),
    })
}

fn match_movement(folded: &str) -> Option<EventKind> {
    if let Some(caps) = INTERRUPTED_RE.captures(folded) {
        return Some(EventKind::Movement {
            axis: axis_from(&caps[1])?,
            interrupted: true,
        });
    }
    let caps = MOVING_RE.captures(folded)?;
    Some(EventKind::Movement {
        axis: axis_from(&caps[1])?,
        interrupted: false,
    })
}

fn match_status(line: &str) -> Option<EventKind> {
    let body = strip_status_prefix(line);
    if !body.starts_with('{') {
        return None;
    }

    let object = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(object)) => object,
        Ok(_) => {
            anomaly(line, "status payload is not an object");
            return None;
        }
        Err(e) => {
            anomaly(line, format!("malformed status JSON: {}", e));
            return None;
        }
    };

    Some(EventKind::Status {
        snapshot: parse_snapshot(line, &object),
    })
}

fn strip_status_prefix(line: &str) -> &str {
    let trimmed = line.trim();
    match trimmed.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("status:") => trimmed[7..].trim_start(),
        _ => trimmed,
    }
}

fn parse_snapshot(line: &str, object: &Map<String, Value>) -> StatusSnapshot {
    let flag = |key: &str| {
        let value = object.get(key)?;
        let parsed = match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            _ => None,
        };
        if parsed.is_none() {
            anomaly(line, format!("'{}' is not a flag: {}", key, value));
        }
        parsed
    };

    let steps = |key: &str| {
        let value = object.get(key)?;
        let parsed = value.as_i64();
        if parsed.is_none() {
            anomaly(line, format!("'{}' is not a step count: {}", key, value));
        }
        parsed
    };

    let mode = object.get("mode").and_then(|value| {
        let parsed = value.as_str().and_then(DeviceMode::from_firmware);
        if parsed.is_none() {
            anomaly(line, format!("unknown mode {}", value));
        }
        parsed
    });

    StatusSnapshot {
        mode,
        emergency: flag("emergency"),
        position_y: steps("posY"),
        position_z: steps("posZ"),
        home_y: flag("homeY"),
        home_z: flag("homeZ"),
        limit_y_min: flag("limitYMin"),
        limit_y_max: flag("limitYMax"),
        limit_z_min: flag("limitZMin"),
        limit_z_max: flag("limitZMax"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes() {
        assert_eq!(
            classify("Modo Manual"),
            EventKind::Mode {
                mode: DeviceMode::Manual
            }
        );
        assert_eq!(
            classify("MODO AUTOMÁTICO"),
            EventKind::Mode {
                mode: DeviceMode::Automatic
            }
        );
        assert_eq!(
            classify("Modo automatico activo"),
            EventKind::Mode {
                mode: DeviceMode::Automatic
            }
        );
        assert_eq!(
            classify("Modo Homing"),
            EventKind::Mode {
                mode: DeviceMode::Homing
            }
        );
    }

    #[test]
    fn test_home_vocabulary() {
        assert_eq!(
            classify("Home Y encontrado"),
            EventKind::Home {
                axis: Some(Axis::Y),
                status: HomeStatus::Found
            }
        );
        assert_eq!(
            classify("Buscando home Z..."),
            EventKind::Home {
                axis: Some(Axis::Z),
                status: HomeStatus::Searching
            }
        );
        assert_eq!(
            classify("Home Y buscando"),
            EventKind::Home {
                axis: Some(Axis::Y),
                status: HomeStatus::Searching
            }
        );
        assert_eq!(
            classify("Secuencia HOME completada"),
            EventKind::Home {
                axis: None,
                status: HomeStatus::Complete
            }
        );
    }

    #[test]
    fn test_limits_with_and_without_accents() {
        assert_eq!(
            classify("Limite Y Max alcanzado"),
            EventKind::Limit {
                axis: Axis::Y,
                side: LimitSide::Max
            }
        );
        assert_eq!(
            classify("Límite Z Mín alcanzado"),
            EventKind::Limit {
                axis: Axis::Z,
                side: LimitSide::Min
            }
        );
    }

    #[test]
    fn test_positions() {
        assert_eq!(
            classify("Y: 1500"),
            EventKind::Position {
                axis: Axis::Y,
                position: 1500
            }
        );
        assert_eq!(
            classify("Z:-20"),
            EventKind::Position {
                axis: Axis::Z,
                position: -20
            }
        );
        // Only at the start of the line
        assert_eq!(classify("Pos Y: 10"), EventKind::Message);
    }

    #[test]
    fn test_position_overflow_falls_through() {
        assert_eq!(classify("Y: 99999999999999999999999"), EventKind::Message);
    }

    #[test]
    fn test_emergency() {
        assert_eq!(
            classify("PARO DE EMERGENCIA ACTIVADO"),
            EventKind::Emergency { active: true }
        );
        assert_eq!(
            classify("PARO DE EMERGENCIA DESACTIVADO"),
            EventKind::Emergency { active: false }
        );
    }

    #[test]
    fn test_error_message_extracted() {
        assert_eq!(
            classify("Error: comando desconocido"),
            EventKind::Error {
                message: "comando desconocido".to_string()
            }
        );
        assert_eq!(
            classify("Recipe Error:bad json"),
            EventKind::Error {
                message: "bad json".to_string()
            }
        );
    }

    #[test]
    fn test_mode_beats_error() {
        assert_eq!(
            classify("Modo Manual Error: x"),
            EventKind::Mode {
                mode: DeviceMode::Manual
            }
        );
    }

    #[test]
    fn test_movement() {
        assert_eq!(
            classify("Moviendo Y 100 pasos"),
            EventKind::Movement {
                axis: Axis::Y,
                interrupted: false
            }
        );
        assert_eq!(
            classify("Movimiento Z interrumpido"),
            EventKind::Movement {
                axis: Axis::Z,
                interrupted: true
            }
        );
    }

    #[test]
    fn test_status_object() {
        let kind = classify(r#"STATUS:{"mode":"MANUAL","emergency":false,"posY":10,"limitZMax":1}"#);
        let EventKind::Status { snapshot } = kind else {
            panic!("expected status, got {:?}", kind);
        };
        assert_eq!(snapshot.mode, Some(DeviceMode::Manual));
        assert_eq!(snapshot.emergency, Some(false));
        assert_eq!(snapshot.position_y, Some(10));
        assert_eq!(snapshot.limit_z_max, Some(true));
        assert_eq!(snapshot.position_z, None);

        let kind = classify(r#"{"posZ": -3, "unknown": "x"}"#);
        let EventKind::Status { snapshot } = kind else {
            panic!("expected status, got {:?}", kind);
        };
        assert_eq!(snapshot.position_z, Some(-3));
    }

    #[test]
    fn test_malformed_status_is_message() {
        assert_eq!(classify("STATUS:{\"posY\":"), EventKind::Message);
        assert_eq!(classify("[1, 2]"), EventKind::Message);
    }

    #[test]
    fn test_unknown_lines_are_messages() {
        assert_eq!(classify("Dip Coater v2.1 listo"), EventKind::Message);
        assert_eq!(classify("Ciclo 1 de 3"), EventKind::Message);
    }

    #[test]
    fn test_decode_keeps_raw_and_time() {
        let at = Utc::now();
        let event = decode_at("Y: 5", at);
        assert_eq!(event.raw, "Y: 5");
        assert_eq!(event.received_at, at);
    }
}

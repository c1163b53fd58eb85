use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// One phase of the host lifecycle.
///
/// Variants are declared in lifecycle order, so `Ord` follows the order in
/// which a host drives them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Prepare,
    Startup,
    /// Invoked repeatedly at the host's check interval.
    Check,
    Shutdown,
    PostProcess,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Prepare,
        Stage::Startup,
        Stage::Check,
        Stage::Shutdown,
        Stage::PostProcess,
    ];

    /// Config key / display name of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Prepare => "prepare",
            Stage::Startup => "startup",
            Stage::Check => "check",
            Stage::Shutdown => "shutdown",
            Stage::PostProcess => "post-process",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "prepare" => Ok(Stage::Prepare),
            "startup" => Ok(Stage::Startup),
            "check" => Ok(Stage::Check),
            "shutdown" => Ok(Stage::Shutdown),
            "post-process" | "postprocess" => Ok(Stage::PostProcess),
            other => Err(format!(
                "invalid stage: {other} (expected prepare, startup, check, shutdown or post-process)"
            )),
        }
    }
}

/// Parse a duration such as `"250ms"`, `"1s"`, `"5m"` or `"2h"`.
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);

    if digits.is_empty() {
        return Err(format!("duration '{s}' does not start with a number"));
    }

    let value: u64 = digits
        .parse()
        .map_err(|e| format!("invalid duration number '{digits}': {e}"))?;

    let secs = |mult: u64| {
        value
            .checked_mul(mult)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration '{s}' is too large"))
    };

    match unit.trim().to_lowercase().as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "" | "s" => secs(1),
        "m" => secs(60),
        "h" => secs(60 * 60),
        other => Err(format!(
            "unsupported duration unit '{other}'; expected ms, s, m, or h"
        )),
    }
}

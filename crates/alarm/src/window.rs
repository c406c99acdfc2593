use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// Wall-clock hours during which readings are evaluated at all.
///
/// The range is half-open, `[start_hour, end_hour)`. When `start_hour` is
/// greater than `end_hour` the window wraps past midnight, so `22-6` covers
/// 22:00 through 05:59.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl ActiveWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    /// Hours must be in `0..=23` and the window must not be empty.
    pub fn is_valid(&self) -> bool {
        self.start_hour <= 23 && self.end_hour <= 23 && self.start_hour != self.end_hour
    }

    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

impl Display for ActiveWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:00-{:02}:00", self.start_hour, self.end_hour)
    }
}

impl FromStr for ActiveWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| format!("expected START-END hours, got {s:?}"))?;
        let start_hour = start
            .trim()
            .parse::<u32>()
            .map_err(|error| format!("invalid start hour {start:?}: {error}"))?;
        let end_hour = end
            .trim()
            .parse::<u32>()
            .map_err(|error| format!("invalid end hour {end:?}: {error}"))?;

        let window = Self::new(start_hour, end_hour);
        if !window.is_valid() {
            return Err(format!(
                "window hours must be distinct and within 0..=23, got {start_hour}-{end_hour}"
            ));
        }
        Ok(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn early_morning_window_ends_before_eight() {
        let window = ActiveWindow::new(0, 8);

        assert!(window.contains(0));
        assert!(window.contains(7));
        assert!(!window.contains(8));
        assert!(!window.contains(23));
    }

    #[test]
    fn window_wraps_past_midnight() {
        let window = ActiveWindow::new(22, 6);

        assert!(window.contains(22));
        assert!(window.contains(23));
        assert!(window.contains(0));
        assert!(window.contains(5));
        assert!(!window.contains(6));
        assert!(!window.contains(12));
    }

    #[test]
    fn parses_hour_ranges() {
        assert_eq!("0-8".parse::<ActiveWindow>(), Ok(ActiveWindow::new(0, 8)));
        assert_eq!(" 22 - 6 ".parse::<ActiveWindow>(), Ok(ActiveWindow::new(22, 6)));
    }

    #[test]
    fn rejects_malformed_or_empty_ranges() {
        assert!("8".parse::<ActiveWindow>().is_err());
        assert!("a-8".parse::<ActiveWindow>().is_err());
        assert!("0-24".parse::<ActiveWindow>().is_err());
        assert!("5-5".parse::<ActiveWindow>().is_err());
    }
}

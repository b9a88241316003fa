use chrono::{DateTime, Utc};
use mapwatch_extract::PageFields;
use serde::Serialize;
use std::fmt;

/// Player count read from the page's `N` or `N/M` text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlayerCount {
    pub current: u32,
    pub max: Option<u32>,
}

impl PlayerCount {
    /// Leading integer is `current`, an optional `/M` is `max`. Text without a
    /// leading number counts as zero players.
    ///
    /// ```
    /// use mapwatch_watch::PlayerCount;
    ///
    /// assert_eq!(PlayerCount::parse("12/24"), PlayerCount { current: 12, max: Some(24) });
    /// assert_eq!(PlayerCount::parse(" 7 "), PlayerCount { current: 7, max: None });
    /// assert_eq!(PlayerCount::parse("full"), PlayerCount::default());
    /// ```
    pub fn parse(text: &str) -> Self {
        let (current, rest) = leading_number(text.trim_start());
        let Some(current) = current else {
            return Self::default();
        };
        let max = rest
            .trim_start()
            .strip_prefix('/')
            .and_then(|r| leading_number(r.trim_start()).0);
        Self { current, max }
    }
}

fn leading_number(s: &str) -> (Option<u32>, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return (None, s);
    }
    // Absurdly long digit runs saturate rather than wrap.
    let n = s[..end].parse::<u32>().unwrap_or(u32::MAX);
    (Some(n), &s[end..])
}

impl fmt::Display for PlayerCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}/{}", self.current, max),
            None => write!(f, "{}", self.current),
        }
    }
}

/// What one refresh learned about one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub url: String,
    pub active_map: Option<String>,
    pub map_image_url: Option<String>,
    pub players_text: Option<String>,
    pub players: PlayerCount,
    pub refreshed_at: DateTime<Utc>,
}

impl ServerInfo {
    pub fn from_fields(url: impl Into<String>, fields: PageFields, refreshed_at: DateTime<Utc>) -> Self {
        let players_text = fields.players.into_option();
        let players = players_text
            .as_deref()
            .map(PlayerCount::parse)
            .unwrap_or_default();
        Self {
            url: url.into(),
            active_map: fields.map_name.into_option(),
            map_image_url: fields.image_url.into_option(),
            players_text,
            players,
            refreshed_at,
        }
    }
}

/// Server with the most current players; ties go to the earliest server.
pub fn busiest(servers: &[ServerInfo]) -> Option<&ServerInfo> {
    servers.iter().fold(None, |best: Option<&ServerInfo>, s| match best {
        Some(b) if s.players.current <= b.players.current => Some(b),
        _ => Some(s),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapwatch_extract::ExtractedField;

    fn info(url: &str, players: u32) -> ServerInfo {
        ServerInfo {
            url: url.into(),
            active_map: None,
            map_image_url: None,
            players_text: Some(players.to_string()),
            players: PlayerCount {
                current: players,
                max: None,
            },
            refreshed_at: Utc::now(),
        }
    }

    #[test]
    fn parses_spaced_current_and_max() {
        assert_eq!(
            PlayerCount::parse("18 / 32"),
            PlayerCount {
                current: 18,
                max: Some(32)
            }
        );
        assert_eq!(
            PlayerCount::parse("5/"),
            PlayerCount {
                current: 5,
                max: None
            }
        );
        assert_eq!(PlayerCount::parse("99999999999").current, u32::MAX);
    }

    #[test]
    fn display_round_trips_the_page_convention() {
        assert_eq!(PlayerCount::parse("3/24").to_string(), "3/24");
        assert_eq!(PlayerCount::parse("3").to_string(), "3");
    }

    #[test]
    fn missing_fields_become_none_and_zero_players() {
        let s = ServerInfo::from_fields("http://a", PageFields::not_found(), Utc::now());
        assert_eq!(s.active_map, None);
        assert_eq!(s.players_text, None);
        assert_eq!(s.players.current, 0);
    }

    #[test]
    fn fields_are_carried_over() {
        let fields = PageFields {
            map_name: ExtractedField::found("pl_upward"),
            image_url: ExtractedField::found("/img/upward.jpg"),
            players: ExtractedField::found("21/24"),
        };
        let s = ServerInfo::from_fields("http://a", fields, Utc::now());
        assert_eq!(s.active_map.as_deref(), Some("pl_upward"));
        assert_eq!(s.map_image_url.as_deref(), Some("/img/upward.jpg"));
        assert_eq!(s.players.current, 21);
        assert_eq!(s.players.max, Some(24));
    }

    #[test]
    fn busiest_prefers_most_players_then_earliest() {
        let servers = vec![info("a", 3), info("b", 10), info("c", 10), info("d", 1)];
        assert_eq!(busiest(&servers).unwrap().url, "b");
        assert!(busiest(&[]).is_none());
    }
}

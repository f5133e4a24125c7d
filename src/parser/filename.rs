//! Release-title and library-path parsing.
//!
//! Titles in the wild are messy; each parser below handles one naming shape
//! and the public functions try them in order of specificity. All regexes are
//! compiled once.

use regex::Regex;
use std::sync::OnceLock;

/// A title that names a single episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEpisode {
    pub series_name: String,
    pub season: i32,
    pub episode: i32,
}

/// A title that names a whole season with no episode marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSeason {
    pub series_name: String,
    pub season: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMovie {
    pub title: String,
    pub year: Option<i32>,
}

fn get_regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("hard-coded pattern must compile"))
}

/// Parse an episode designation out of a release title or file name.
/// Returns `None` for season packs and anything unrecognized.
#[must_use]
pub fn parse_episode(name: &str) -> Option<ParsedEpisode> {
    parse_sxxexx(name).or_else(|| parse_x_format(name))
}

fn parse_sxxexx(name: &str) -> Option<ParsedEpisode> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(
        &RE,
        r"(?i)^(?P<title>.+?)[ ._-]+S(?P<season>\d{1,3})[ ._]?E(?P<episode>\d{1,4})(?:[ ._-]|$)",
    );

    let caps = re.captures(name)?;
    Some(ParsedEpisode {
        series_name: clean_title(caps.name("title")?.as_str()),
        season: caps.name("season")?.as_str().parse().ok()?,
        episode: caps.name("episode")?.as_str().parse().ok()?,
    })
}

fn parse_x_format(name: &str) -> Option<ParsedEpisode> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(
        &RE,
        r"(?i)^(?P<title>.+?)[ ._-]+(?P<season>\d{1,2})x(?P<episode>\d{2,3})(?:[ ._-]|$)",
    );

    let caps = re.captures(name)?;
    Some(ParsedEpisode {
        series_name: clean_title(caps.name("title")?.as_str()),
        season: caps.name("season")?.as_str().parse().ok()?,
        episode: caps.name("episode")?.as_str().parse().ok()?,
    })
}

/// Parse a season-pack designation: a season marker with no episode part.
/// Titles that carry an episode marker are not season packs.
#[must_use]
pub fn parse_season_pack(name: &str) -> Option<ParsedSeason> {
    if parse_episode(name).is_some() {
        return None;
    }
    parse_sxx(name).or_else(|| parse_season_word(name))
}

fn parse_sxx(name: &str) -> Option<ParsedSeason> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(
        &RE,
        r"(?i)^(?P<title>.+?)[ ._-]+S(?P<season>\d{1,3})(?:[ ._-]|$)",
    );

    let caps = re.captures(name)?;
    Some(ParsedSeason {
        series_name: clean_title(caps.name("title")?.as_str()),
        season: caps.name("season")?.as_str().parse().ok()?,
    })
}

fn parse_season_word(name: &str) -> Option<ParsedSeason> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(
        &RE,
        r"(?i)^(?P<title>.+?)[ ._-]+Season[ ._-]*(?P<season>\d{1,3})(?:[ ._-]|$)",
    );

    let caps = re.captures(name)?;
    Some(ParsedSeason {
        series_name: clean_title(caps.name("title")?.as_str()),
        season: caps.name("season")?.as_str().parse().ok()?,
    })
}

/// Parse a movie title, splitting off a trailing year when present.
#[must_use]
pub fn parse_movie(name: &str) -> Option<ParsedMovie> {
    let stem = strip_extension(name);

    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(
        &RE,
        r"^(?P<title>.+?)[ ._-]+\(?(?P<year>(?:19|20)\d{2})\)?(?:[ ._-]|$)",
    );

    if let Some(caps) = re.captures(stem) {
        return Some(ParsedMovie {
            title: clean_title(caps.name("title")?.as_str()),
            year: caps.name("year")?.as_str().parse().ok(),
        });
    }

    let title = clean_title(stem);
    if title.is_empty() {
        return None;
    }
    Some(ParsedMovie { title, year: None })
}

#[must_use]
pub fn strip_extension(name: &str) -> &str {
    name.rsplit_once('.')
        .filter(|(_, ext)| ext.len() <= 4 && ext.chars().all(char::is_alphanumeric))
        .map_or(name, |(stem, _)| stem)
}

fn clean_title(raw: &str) -> String {
    let cleaned = raw.replace(['.', '_'], " ");
    cleaned
        .trim()
        .trim_end_matches('-')
        .trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dot_separated_episode() {
        let parsed = parse_episode("Fargo.S02E04.1080p.WEB-DL.mkv").unwrap();
        assert_eq!(parsed.series_name, "Fargo");
        assert_eq!(parsed.season, 2);
        assert_eq!(parsed.episode, 4);
    }

    #[test]
    fn parses_space_separated_episode() {
        let parsed = parse_episode("The Expanse - S01E10 - Leviathan Wakes").unwrap();
        assert_eq!(parsed.series_name, "The Expanse");
        assert_eq!(parsed.season, 1);
        assert_eq!(parsed.episode, 10);
    }

    #[test]
    fn parses_x_format_episode() {
        let parsed = parse_episode("Show Name 3x07 720p").unwrap();
        assert_eq!(parsed.series_name, "Show Name");
        assert_eq!(parsed.season, 3);
        assert_eq!(parsed.episode, 7);
    }

    #[test]
    fn season_pack_requires_no_episode_marker() {
        assert!(parse_season_pack("Fargo.S02E04.1080p").is_none());

        let pack = parse_season_pack("Fargo.S02.1080p.Complete").unwrap();
        assert_eq!(pack.series_name, "Fargo");
        assert_eq!(pack.season, 2);
    }

    #[test]
    fn season_word_pack() {
        let pack = parse_season_pack("Fargo Season 2 1080p").unwrap();
        assert_eq!(pack.season, 2);
    }

    #[test]
    fn parses_movie_with_year() {
        let parsed = parse_movie("Heat.1995.1080p.BluRay.mkv").unwrap();
        assert_eq!(parsed.title, "Heat");
        assert_eq!(parsed.year, Some(1995));
    }

    #[test]
    fn parses_movie_without_year() {
        let parsed = parse_movie("Some Obscure Film.mkv").unwrap();
        assert_eq!(parsed.title, "Some Obscure Film");
        assert_eq!(parsed.year, None);
    }

    #[test]
    fn unparsable_returns_none() {
        assert!(parse_episode("randomfile").is_none());
        assert!(parse_season_pack("randomfile").is_none());
    }
}

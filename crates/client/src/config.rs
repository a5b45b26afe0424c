//! The one-per-user configuration consumed only at server start (spec
//! §3, §4.7). The grammar is deliberately minimal (spec §1's "Config file
//! parsing beyond the minimal grammar" non-goal): five line shapes, a
//! `\`-line continuation, and `#` comments. Recovered from
//! `examples/original_source/src/c/scramjet.c::load_config()`.

use crate::error::ConfigError;
use std::io::BufRead;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub startup_cmd: String,
    pub idle_timeout_minutes: u32,
    pub aliases: Vec<String>,
    pub classpaths: Vec<String>,
    pub charset: String,
}

const DEFAULT_IDLE_TIMEOUT_MINUTES: u32 = 15;
const DEFAULT_CHARSET: &str = "ISO-8859-1";

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)
            .map_err(|e| ConfigError::Open(path.to_path_buf(), e))?;
        Self::parse(std::io::BufReader::new(file).lines().map(|l| {
            l.map_err(|e| ConfigError::Open(path.to_path_buf(), e))
        }))
    }

    /// Parses pre-joined logical lines (continuation/whitespace handling
    /// already applied by [`join_continuations`]). Split out from
    /// [`Config::load`] so tests can exercise the grammar without touching
    /// the filesystem.
    fn parse<I>(lines: I) -> Result<Self, ConfigError>
    where
        I: Iterator<Item = Result<String, ConfigError>>,
    {
        let mut startup_cmd: Option<String> = None;
        let mut idle_timeout_minutes: Option<u32> = None;
        let mut aliases = Vec::new();
        let mut classpaths = Vec::new();
        let mut charset = DEFAULT_CHARSET.to_string();

        for logical_line in join_continuations(lines) {
            let line = logical_line?;
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(rest) = line.strip_prefix("alias ") {
                aliases.push(rest.to_string());
            } else if let Some(rest) = line.strip_prefix("classpath ") {
                classpaths.push(rest.to_string());
            } else if let Some(rest) = line.strip_prefix("startup ") {
                if startup_cmd.is_some() {
                    return Err(ConfigError::DuplicateStartup);
                }
                startup_cmd = Some(rest.to_string());
            } else if let Some(rest) = line.strip_prefix("idle_timeout ") {
                if idle_timeout_minutes.is_some() {
                    return Err(ConfigError::DuplicateIdleTimeout);
                }
                let value: u32 = rest
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidIdleTimeout(line.to_string()))?;
                idle_timeout_minutes = Some(value);
            } else if let Some(rest) = line.strip_prefix("charset ") {
                charset = rest.to_string();
            } else {
                return Err(ConfigError::BadLine(line.to_string()));
            }
        }

        Ok(Config {
            startup_cmd: startup_cmd.ok_or(ConfigError::MissingStartup)?,
            idle_timeout_minutes: idle_timeout_minutes.unwrap_or(DEFAULT_IDLE_TIMEOUT_MINUTES),
            aliases,
            classpaths,
            charset,
        })
    }
}

/// Joins lines ending in `\` (after trailing-whitespace strip) onto the
/// following line, matching the original's `fgets`-based continuation
/// handling.
fn join_continuations<I>(mut lines: I) -> impl Iterator<Item = Result<String, ConfigError>>
where
    I: Iterator<Item = Result<String, ConfigError>>,
{
    std::iter::from_fn(move || {
        let mut acc = match lines.next()? {
            Ok(l) => l,
            Err(e) => return Some(Err(e)),
        };
        loop {
            let trimmed = acc.trim_end();
            if let Some(stripped) = trimmed.strip_suffix('\\') {
                acc = stripped.to_string();
                match lines.next() {
                    Some(Ok(next)) => acc.push_str(&next),
                    Some(Err(e)) => return Some(Err(e)),
                    None => break,
                }
            } else {
                acc = trimmed.to_string();
                break;
            }
        }
        Some(Ok(acc))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> impl Iterator<Item = Result<String, ConfigError>> + '_ {
        text.lines().map(|l| Ok(l.to_string()))
    }

    #[test]
    fn parses_minimal_config() {
        let cfg = Config::parse(lines("startup java -jar tool.jar")).unwrap();
        assert_eq!(cfg.startup_cmd, "java -jar tool.jar");
        assert_eq!(cfg.idle_timeout_minutes, 15);
        assert_eq!(cfg.charset, "ISO-8859-1");
    }

    #[test]
    fn parses_full_config_with_comment_and_blank_lines() {
        let text = "# comment\n\nstartup java -jar tool.jar\nidle_timeout 30\nalias foo net.example.Foo\nclasspath /tmp/x.jar\ncharset UTF-8\n";
        let cfg = Config::parse(lines(text)).unwrap();
        assert_eq!(cfg.idle_timeout_minutes, 30);
        assert_eq!(cfg.aliases, vec!["foo net.example.Foo".to_string()]);
        assert_eq!(cfg.classpaths, vec!["/tmp/x.jar".to_string()]);
        assert_eq!(cfg.charset, "UTF-8");
    }

    #[test]
    fn duplicate_startup_is_fatal() {
        let text = "startup a\nstartup b\n";
        assert!(matches!(
            Config::parse(lines(text)),
            Err(ConfigError::DuplicateStartup)
        ));
    }

    #[test]
    fn duplicate_idle_timeout_is_fatal() {
        let text = "startup a\nidle_timeout 1\nidle_timeout 2\n";
        assert!(matches!(
            Config::parse(lines(text)),
            Err(ConfigError::DuplicateIdleTimeout)
        ));
    }

    #[test]
    fn missing_startup_is_fatal() {
        assert!(matches!(
            Config::parse(lines("alias foo bar\n")),
            Err(ConfigError::MissingStartup)
        ));
    }

    #[test]
    fn bad_line_is_fatal() {
        assert!(matches!(
            Config::parse(lines("nonsense line\n")),
            Err(ConfigError::BadLine(_))
        ));
    }

    #[test]
    fn backslash_continuation_joins_lines() {
        let text = "startup java \\\n  -jar tool.jar\n";
        let cfg = Config::parse(lines(text)).unwrap();
        assert_eq!(cfg.startup_cmd, "java   -jar tool.jar");
    }
}

// Application configuration, loaded from environment variables and CLI flags.

use std::path::{Path, PathBuf};

pub const STEAM: &str = "steam";
pub const STAND_ALONE: &str = "stand_alone";

/// One monitored game installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileConfig {
    pub id: String,
    pub log_path: PathBuf,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Directory of overlay assets served at `/`.
    pub static_dir: PathBuf,
    /// Directory listed by `GET /note`.
    pub notes_dir: PathBuf,
    /// TOML file replacing the built-in strategy notes.
    pub notes_file: Option<PathBuf>,
    /// Client profiles with a known log location.
    pub profiles: Vec<ProfileConfig>,
    /// Re-scan logs on filesystem change notifications.
    pub watch_logs: bool,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `PORT` - HTTP server port (default: 3232)
    /// - `STATIC_DIR` - overlay assets (default: `static`)
    /// - `NOTES_DIR` - helper documents listed by `/note` (default: `<STATIC_DIR>/notes`)
    /// - `NOTES_FILE` - TOML notes replacing the built-in ones
    /// - `STEAM_LOG_PATH` / `STAND_ALONE_LOG_PATH` - override the default log locations
    /// - `WATCH_LOGS` - set to `false` or `0` to disable filesystem notifications
    ///
    /// CLI flags take precedence: `--port`, `--static-dir`, `--notes`,
    /// `--steam-log`, `--stand-alone-log`, `--no-watch`.
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok(), dirs::home_dir())
    }

    pub fn from_sources<E>(args: &[String], env: E, home: Option<PathBuf>) -> Self
    where
        E: Fn(&str) -> Option<String>,
    {
        let setting = |flag: &str, var: &str| Self::parse_cli_value(args, flag).or_else(|| env(var));

        let port = setting("--port", "PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(3232);

        let static_dir = setting("--static-dir", "STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("static"));

        let notes_dir = env("NOTES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| static_dir.join("notes"));

        let notes_file = setting("--notes", "NOTES_FILE").map(PathBuf::from);

        let watch_logs = !args.iter().any(|a| a == "--no-watch")
            && env("WATCH_LOGS")
                .map(|v| !(v.eq_ignore_ascii_case("false") || v == "0"))
                .unwrap_or(true);

        let mut profiles = Vec::new();
        let candidates = [
            (
                STAND_ALONE,
                setting("--stand-alone-log", "STAND_ALONE_LOG_PATH"),
                default_stand_alone_log(home.as_deref()),
            ),
            (
                STEAM,
                setting("--steam-log", "STEAM_LOG_PATH"),
                default_steam_log(home.as_deref()),
            ),
        ];
        for (id, explicit, default) in candidates {
            match explicit.map(PathBuf::from).or(default) {
                Some(log_path) => profiles.push(ProfileConfig {
                    id: id.to_string(),
                    log_path,
                }),
                None => tracing::warn!(
                    "No log location for profile '{id}': home directory unknown and no override set"
                ),
            }
        }

        Config {
            port,
            static_dir,
            notes_dir,
            notes_file,
            profiles,
            watch_logs,
        }
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

const LOG_TAIL: [&str; 3] = ["Path of Exile", "logs", "Client.txt"];

fn under(base: PathBuf, parts: &[&str]) -> PathBuf {
    parts
        .iter()
        .chain(LOG_TAIL.iter())
        .fold(base, |path, part| path.join(part))
}

/// Default `Client.txt` of the Steam release.
pub fn default_steam_log(home: Option<&Path>) -> Option<PathBuf> {
    if cfg!(windows) {
        return Some(under(
            PathBuf::from(r"C:\Program Files (x86)"),
            &["Steam", "steamapps", "common"],
        ));
    }
    home.map(|home| {
        under(
            home.to_path_buf(),
            &[".steam", "steam", "steamapps", "common"],
        )
    })
}

/// Default `Client.txt` of the stand-alone release (under Wine off Windows).
pub fn default_stand_alone_log(home: Option<&Path>) -> Option<PathBuf> {
    if cfg!(windows) {
        return Some(under(
            PathBuf::from(r"C:\Program Files (x86)"),
            &["Grinding Gear Games"],
        ));
    }
    home.map(|home| {
        under(
            home.to_path_buf(),
            &[
                "Games",
                "path-of-exile",
                "drive_c",
                "Program Files (x86)",
                "Grinding Gear Games",
            ],
        )
    })
}

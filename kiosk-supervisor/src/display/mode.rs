//! The three-state display mode (spec §3 "Display mode" / §4.4a).

use std::ffi::OsString;

use crate::config::Config;

/// What the child process should currently be showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Stream(String),
    Holding,
    Failure,
}

impl Mode {
    /// A short, stable label used in metrics (spec §4.5 "current_mode").
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Stream(_) => "stream",
            Mode::Holding => "holding",
            Mode::Failure => "failure",
        }
    }

    /// Enum-encoded gauge value for `current_mode` (spec §4.5).
    pub fn gauge_value(&self) -> f64 {
        match self {
            Mode::Holding => 0.0,
            Mode::Stream(_) => 1.0,
            Mode::Failure => 2.0,
        }
    }

    /// Build the full argument vector (`argv[0]` is the program) for
    /// spawning this mode, parameterized entirely by configuration (spec
    /// §4.4c: "the command vector is parameterized by configuration so the
    /// specific binary can be substituted").
    pub fn command(&self, config: &Config) -> Vec<OsString> {
        match self {
            Mode::Stream(url) => {
                let mut argv = vec![OsString::from(&config.player_binary)];
                argv.extend(config.player_args.iter().map(OsString::from));
                argv.push(OsString::from(url));
                argv
            }
            Mode::Holding => {
                let mut argv = vec![OsString::from(&config.viewer_binary)];
                argv.extend(config.viewer_args.iter().map(OsString::from));
                argv.push(config.holding_image_path.clone().into_os_string());
                argv
            }
            Mode::Failure => {
                let mut argv = vec![OsString::from(&config.viewer_binary)];
                argv.extend(config.viewer_args.iter().map(OsString::from));
                argv.push(config.failure_image_path.clone().into_os_string());
                argv
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> Config {
        Config {
            access_token: "t".into(),
            api_key: "k".into(),
            api_secret: "s".into(),
            stream_id: "id".into(),
            holding_image_path: "/images/holding.png".into(),
            failure_image_path: "/images/failure.png".into(),
            player_binary: "mpv".into(),
            player_args: vec!["--fullscreen".into()],
            viewer_binary: "feh".into(),
            viewer_args: vec!["--fullscreen".into(), "--slideshow-delay=-1".into()],
            poll_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            failure_threshold: 3,
            stability_threshold: 5,
            min_retry: Duration::from_secs(10),
            max_retry: Duration::from_secs(300),
            enable_backoff: true,
            scrape_bind_host: "127.0.0.1".into(),
            scrape_bind_port: 0,
            system_probe: crate::config::ProbeConfig {
                enabled: false,
                interval: Duration::from_secs(10),
            },
            network_probe: crate::config::ProbeConfig {
                enabled: false,
                interval: Duration::from_secs(30),
            },
            stream_probe: crate::config::ProbeConfig {
                enabled: false,
                interval: Duration::from_secs(60),
            },
            network_probe_hosts: vec![],
            stream_probe_timeout: Duration::from_secs(15),
            stream_probe_binary: "ffprobe".into(),
            stream_probe_args: vec![],
        }
    }

    #[test]
    fn stream_command_ends_with_url() {
        let cfg = config();
        let argv = Mode::Stream("https://live/1.m3u8".to_string()).command(&cfg);
        assert_eq!(argv[0], OsString::from("mpv"));
        assert_eq!(argv.last().unwrap(), &OsString::from("https://live/1.m3u8"));
    }

    #[test]
    fn holding_and_failure_use_distinct_images() {
        let cfg = config();
        let holding = Mode::Holding.command(&cfg);
        let failure = Mode::Failure.command(&cfg);
        assert_eq!(holding.last().unwrap(), &OsString::from("/images/holding.png"));
        assert_eq!(failure.last().unwrap(), &OsString::from("/images/failure.png"));
        assert_ne!(holding.last(), failure.last());
    }

    #[test]
    fn equal_stream_urls_are_equal_modes() {
        assert_eq!(
            Mode::Stream("u".to_string()),
            Mode::Stream("u".to_string())
        );
        assert_ne!(
            Mode::Stream("u1".to_string()),
            Mode::Stream("u2".to_string())
        );
    }
}

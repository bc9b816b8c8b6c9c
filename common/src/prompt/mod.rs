use std::{
    fmt::{Display, Formatter},
    fs,
    path::Path,
    str::FromStr,
};

use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Could not create log directory '{0}': {1}")]
    Directory(String, std::io::Error),
    #[error("Could not open log file: {0}")]
    File(#[from] std::io::Error),
    #[error(transparent)]
    SetLogger(#[from] log::SetLoggerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Off => Self::Off,
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            Self::Off => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        f.write_str(str)
    }
}

impl FromStr for LogLevel {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "off" => Self::Off,
            "error" => Self::Error,
            "warn" => Self::Warn,
            "info" => Self::Info,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => return Err("Invalid log level"),
        })
    }
}

pub fn default_logs_datetime_format() -> String {
    "[%Y-%m-%d] (%H:%M:%S%.3f)".to_owned()
}

pub struct LoggerConfig<'a> {
    pub level: LogLevel,
    pub dir_path: &'a str,
    pub filename_log: &'a str,
    pub disable_file_logging: bool,
    pub disable_colors: bool,
    pub logs_datetime_format: String,
}

/// Install the process wide logger: colored lines on stdout and, unless
/// disabled, plain lines appended to `dir_path/filename_log`.
pub fn setup_logger(config: LoggerConfig<'_>) -> Result<(), LoggerError> {
    let colors = ColoredLevelConfig::new()
        .debug(Color::Green)
        .info(Color::Cyan)
        .warn(Color::Yellow)
        .error(Color::Red);

    let disable_colors = config.disable_colors;
    let stdout_format = config.logs_datetime_format.clone();
    let stdout_log = fern::Dispatch::new()
        .format(move |out, message, record| {
            let target = record.target();
            let target_with_pad = " ".repeat((30i16 - target.len() as i16).max(0) as usize) + target;
            let time = chrono::Local::now().format(&stdout_format);
            if disable_colors {
                out.finish(format_args!(
                    "{} {} {} > {}",
                    time,
                    record.level(),
                    target_with_pad,
                    message
                ))
            } else {
                out.finish(format_args!(
                    "\x1b[90m{}\x1b[0m {} \x1b[90m{}\x1b[0m > {}",
                    time,
                    colors.color(record.level()),
                    target_with_pad,
                    message
                ))
            }
        })
        .chain(std::io::stdout());

    let mut base = fern::Dispatch::new()
        .level(config.level.into())
        .chain(stdout_log);

    if !config.disable_file_logging {
        let dir = Path::new(config.dir_path);
        fs::create_dir_all(dir)
            .map_err(|e| LoggerError::Directory(config.dir_path.to_owned(), e))?;

        let file_format = config.logs_datetime_format;
        let file_log = fern::Dispatch::new()
            .format(move |out, message, record| {
                out.finish(format_args!(
                    "{} [{}] [{}] {}",
                    chrono::Local::now().format(&file_format),
                    record.level(),
                    record.target(),
                    message
                ))
            })
            .chain(fern::log_file(dir.join(config.filename_log))?);
        base = base.chain(file_log);
    }

    base.apply()?;
    Ok(())
}

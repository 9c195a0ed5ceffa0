//! Console and file logging plus an optional Telegram mirror.

use crate::{
    config::TelegramConfig,
    error::{Error, Result},
};
use chrono::{DateTime, Local, NaiveDate};
use env_logger::{Builder, Env, Logger, Target, WriteStyle};
use log::{LevelFilter, Log, Metadata, Record};
use serde::Serialize;
use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

const TELEGRAM_API: &str = "https://api.telegram.org";
const MIRRORED_TARGET: &str = "scroll_canvas";
const LOG_DIR: &str = "logs";
const LOG_NAME: &str = "scroll_canvas";

pub fn format_line(level: log::Level, message: &std::fmt::Arguments) -> String {
    format!(
        "{} | {:<8} | {}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        level,
        message
    )
}

fn console_builder() -> Builder {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| writeln!(buf, "{}", format_line(record.level(), record.args())));
    builder
}

/// `logs/scroll_canvas.log`, moved aside to `scroll_canvas.<date>.log` on
/// the first write of a new day.
pub struct DailyFile {
    dir: PathBuf,
    day: NaiveDate,
    file: File,
}

impl DailyFile {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let file = Self::append(&dir.join(format!("{}.log", LOG_NAME)))?;
        let day = file
            .metadata()
            .and_then(|m| m.modified())
            .map(|t| DateTime::<Local>::from(t).date_naive())
            .unwrap_or_else(|_| Local::now().date_naive());
        Ok(DailyFile {
            dir: dir.to_path_buf(),
            day,
            file,
        })
    }

    fn append(path: &Path) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path)
    }

    fn current(&self) -> PathBuf {
        self.dir.join(format!("{}.log", LOG_NAME))
    }

    fn archived(&self) -> PathBuf {
        self.dir
            .join(format!("{}.{}.log", LOG_NAME, self.day.format("%Y-%m-%d")))
    }

    fn roll_to(&mut self, today: NaiveDate) -> io::Result<()> {
        if today == self.day {
            return Ok(());
        }
        self.file.flush()?;
        fs::rename(self.current(), self.archived())?;
        self.file = Self::append(&self.current())?;
        self.day = today;
        Ok(())
    }
}

impl Write for DailyFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.roll_to(Local::now().date_naive())?;
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

pub struct TelegramSink {
    client: reqwest::blocking::Client,
    url: String,
    chat_id: i64,
    level: LevelFilter,
    session: String,
}

impl TelegramSink {
    pub fn new(config: &TelegramConfig, session: &str) -> Result<Self> {
        let level = LevelFilter::from_str(&config.log_level)
            .map_err(|_| Error::Config(format!("unknown telegram log level \"{}\"", config.log_level)))?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(TelegramSink {
            client,
            url: format!("{}/bot{}/sendMessage", TELEGRAM_API, config.token),
            chat_id: config.chat_id,
            level,
            session: session.to_string(),
        })
    }

    /// Only this crate's records, the http and rpc stacks stay local.
    fn accepts(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.target().starts_with(MIRRORED_TARGET)
    }

    fn entry(&self, line: &str) -> String {
        format!("#{}\n{}", self.session, line)
    }

    fn send(&self, text: &str) {
        let body = SendMessage {
            chat_id: self.chat_id,
            text,
            disable_web_page_preview: true,
        };
        match self.client.post(&self.url).json(&body).send() {
            Ok(res) if !res.status().is_success() => eprintln!("telegram: {}", res.status()),
            Err(e) => eprintln!("telegram: {}", e),
            Ok(_) => {}
        }
    }
}

pub struct Dispatch {
    console: Logger,
    file: Option<Logger>,
    telegram: Option<TelegramSink>,
}

impl Log for Dispatch {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata)
            || self.file.as_ref().map_or(false, |f| f.enabled(metadata))
            || self.telegram.as_ref().map_or(false, |tg| tg.accepts(metadata))
    }

    fn log(&self, record: &Record) {
        if self.console.matches(record) {
            self.console.log(record);
        }
        if let Some(file) = &self.file {
            if file.matches(record) {
                file.log(record);
            }
        }
        if let Some(tg) = &self.telegram {
            if tg.accepts(record.metadata()) {
                tg.send(&tg.entry(&format_line(record.level(), record.args())));
            }
        }
    }

    fn flush(&self) {
        self.console.flush();
        if let Some(file) = &self.file {
            file.flush();
        }
    }
}

/// Installs the global logger. Returns the session id tagging mirrored
/// messages.
pub fn init(telegram: Option<&TelegramConfig>) -> Result<String> {
    let session = uuid::Uuid::new_v4().simple().to_string();
    let console = console_builder().build();
    let file = match DailyFile::open(Path::new(LOG_DIR)) {
        Ok(daily) => Some(
            console_builder()
                .target(Target::Pipe(Box::new(daily)))
                .write_style(WriteStyle::Never)
                .build(),
        ),
        Err(e) => {
            eprintln!("file log disabled: {}", e);
            None
        }
    };

    let telegram = match telegram {
        Some(config) => match config.validated()? {
            Some(config) => Some(TelegramSink::new(config, &session)?),
            None => None,
        },
        None => None,
    };

    let mut max_level = console.filter();
    if let Some(file) = &file {
        max_level = max_level.max(file.filter());
    }
    if let Some(tg) = &telegram {
        tg.send(&format!("Starting session with ID #{}", session));
        max_level = max_level.max(tg.level);
    }

    log::set_boxed_logger(Box::new(Dispatch { console, file, telegram }))
        .map_err(|e| Error::Config(format!("logger already installed: {}", e)))?;
    log::set_max_level(max_level);
    Ok(session)
}

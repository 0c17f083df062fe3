use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Duration;

use strlog_source::{
    streams_source_new, GlobalConfig, HookPoint, LogMessage, LogPipe, SourceConfig, SourceDriver,
};
use tracing::{info, warn};

use crate::cmd::{parse_duration, RunArgs};
use crate::exit::{
    io_error, source_error, CliError, CliResult, INTERNAL, SUCCESS, UNSUPPORTED, USAGE,
};
use crate::output::{print_record, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    if args.count == Some(0) {
        return Err(CliError::new(USAGE, "--count must be greater than zero"));
    }
    let interval = parse_duration(&args.poll_interval)?;
    let config = load_config(&args)?;

    let mut source = streams_source_new(&config.device)
        .map_err(|err| source_error("source setup failed", err))?;
    if !source.is_streams() {
        return Err(CliError::new(
            UNSUPPORTED,
            format!(
                "cannot read {}: STREAMS log devices are not supported on this platform",
                config.device.display()
            ),
        ));
    }
    source
        .configure(&config)
        .map_err(|err| source_error("source setup failed", err))?;

    let (tx, rx) = mpsc::channel::<LogMessage>();
    source.base_mut().append(Arc::new(move |msg: LogMessage| {
        let _ = tx.send(msg);
    }));

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let cfg = GlobalConfig::new().with_settings(config.global);
    cfg.hooks.run(HookPoint::Startup);
    if let Err(err) = source.init(&cfg) {
        let _ = source.deinit();
        source.free();
        return Err(source_error("source init failed", err));
    }
    // Runs in the foreground: there is no fork to wait for.
    cfg.hooks.run(HookPoint::PostDaemonized);

    let result = pump(&mut source, &rx, &running, interval, args.count, format);

    cfg.hooks.run(HookPoint::PreShutdown);
    if let Err(err) = source.deinit() {
        warn!(error = %err, "source teardown failed");
    }
    source.free();
    cfg.hooks.run(HookPoint::Shutdown);

    result
}

fn load_config(args: &RunArgs) -> CliResult<SourceConfig> {
    let mut config = match &args.config {
        Some(path) => {
            SourceConfig::from_path(path).map_err(|err| source_error("config load failed", err))?
        }
        None => SourceConfig::default(),
    };

    if let Some(device) = &args.device {
        config.device = device.clone();
    }
    if let Some(door) = &args.door {
        config.door = Some(door.clone());
    }
    if let Some(id) = &args.id {
        config.id = Some(id.clone());
    }
    if let Some(msg_size) = args.msg_size {
        config.reader.msg_size = msg_size;
    }

    config
        .validate()
        .map_err(|err| source_error("invalid configuration", err))?;
    Ok(config)
}

fn pump(
    source: &mut SourceDriver,
    rx: &Receiver<LogMessage>,
    running: &AtomicBool,
    interval: Duration,
    count: Option<usize>,
    format: OutputFormat,
) -> CliResult<i32> {
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let Some(reader) = source.reader_mut() else {
            return Err(CliError::new(INTERNAL, "source has no reader attached"));
        };

        match reader.wait_readable(interval) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(io_error("waiting for log device failed", err)),
        }

        reader
            .fetch()
            .map_err(|err| source_error("reading log device failed", err))?;

        while let Ok(msg) = rx.try_recv() {
            print_record(&msg, format);
            printed = printed.saturating_add(1);

            if count.is_some_and(|count| printed >= count) {
                info!(printed, "record count reached");
                return Ok(SUCCESS);
            }
        }
    }

    info!(printed, "interrupted");
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn args() -> RunArgs {
        RunArgs {
            device: None,
            door: None,
            config: None,
            id: None,
            msg_size: None,
            count: None,
            poll_interval: "500ms".to_string(),
        }
    }

    #[test]
    fn flags_override_defaults() {
        let config = load_config(&RunArgs {
            device: Some(PathBuf::from("/dev/conslog")),
            door: Some(PathBuf::from("/tmp/door")),
            msg_size: Some(2048),
            ..args()
        })
        .unwrap();

        assert_eq!(config.device, PathBuf::from("/dev/conslog"));
        assert_eq!(config.door, Some(PathBuf::from("/tmp/door")));
        assert_eq!(config.reader.msg_size, 2048);
    }

    #[test]
    fn empty_device_is_rejected() {
        let err = load_config(&RunArgs {
            device: Some(PathBuf::new()),
            ..args()
        })
        .unwrap_err();
        assert_eq!(err.code, crate::exit::DATA_INVALID);
    }

    #[test]
    fn missing_config_file_is_a_usage_error() {
        let err = load_config(&RunArgs {
            config: Some(PathBuf::from("/nonexistent/strlog.json")),
            ..args()
        })
        .unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}

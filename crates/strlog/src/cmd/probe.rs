use serde::Serialize;
use strlog_door::{default_backend, DoorRegistrar};

use crate::cmd::ProbeArgs;
use crate::exit::{door_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct ProbeOutput {
    schema_id: &'static str,
    path: String,
    backend: &'static str,
    alive: bool,
    reply_bytes: usize,
}

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let registrar = DoorRegistrar::new(default_backend());
    let reply = registrar
        .probe(&args.path)
        .map_err(|err| door_error("door probe failed", err))?;

    let out = ProbeOutput {
        schema_id: "https://schemas.3leaps.dev/strlog/cli/v1/door-probe.schema.json",
        path: args.path.display().to_string(),
        backend: registrar.backend().name(),
        alive: true,
        reply_bytes: reply.len(),
    };

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table | OutputFormat::Pretty => println!(
            "door {} is answering ({} backend, {} byte reply)",
            out.path, out.backend, out.reply_bytes
        ),
        OutputFormat::Raw => println!("alive"),
    }

    Ok(SUCCESS)
}

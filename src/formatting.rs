use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use colorizer_lib::output::{ColorizeStatus, OUTPUT_VERSION};
use colorizer_lib::{ColorizerError, ColorizerOutput, ErrorOutput};

use crate::cli::OutputFormat;

/// Write output in the requested format.
pub fn write_output(
    body: &ColorizerOutput,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => write_json_output(body, output)?,
        OutputFormat::Pretty => write_pretty_output(body, output)?,
    };
    Ok(())
}

/// Write `body` and map it to the process exit code.
pub fn finish(body: ColorizerOutput, format: OutputFormat, output: Option<PathBuf>) -> ExitCode {
    if let Err(err) = write_output(&body, format, output.as_deref()) {
        return render_error(
            ColorizerError::Unknown(format!("failed to write output: {err}")),
            format,
            output,
        );
    }
    ExitCode::from(body.exit_code())
}

/// Render an error and return the appropriate exit code.
pub fn render_error(err: ColorizerError, format: OutputFormat, output: Option<PathBuf>) -> ExitCode {
    let error_payload = err.to_payload();
    let payload = ColorizerOutput::Error(ErrorOutput {
        version: OUTPUT_VERSION.to_string(),
        message: Some(error_payload.message.clone()),
        error: error_payload,
    });

    match format {
        OutputFormat::Json => {
            let content =
                serde_json::to_string(&payload).unwrap_or_else(|_| "{\"mode\":\"error\"}".into());
            if let Some(path) = output {
                if let Err(write_err) = std::fs::write(&path, &content) {
                    eprintln!("Failed to write error output: {}", write_err);
                    println!("{content}");
                }
            } else {
                println!("{content}");
            }
        }
        OutputFormat::Pretty => {
            if let Err(write_err) = write_pretty_output(&payload, output.as_deref()) {
                eprintln!("Failed to write error output: {}", write_err);
            }
        }
    };

    // Exit code 2 is for errors; refusals (offline, cancelled, busy) use 1.
    ExitCode::from(2)
}

/// Write JSON output to file or stdout.
fn write_json_output(
    body: &ColorizerOutput,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = serde_json::to_string(body)?;
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Write pretty output to file or stdout.
fn write_pretty_output(body: &ColorizerOutput, output: Option<&Path>) -> io::Result<()> {
    let stdout_is_tty = std::io::stdout().is_terminal();
    let use_human = output.is_none() && stdout_is_tty;

    if use_human {
        let content = format_pretty(body, true);
        println!("{content}");
        return Ok(());
    }

    // Non-tty or file output: keep JSON shape for pipelines/files.
    let content =
        serde_json::to_string_pretty(body).unwrap_or_else(|_| "{\"mode\":\"error\"}".to_string());
    if let Some(path) = output {
        std::fs::write(path, &content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Format output for human consumption in a terminal.
pub fn format_pretty(body: &ColorizerOutput, colorize: bool) -> String {
    let mut buf = String::new();
    match body {
        ColorizerOutput::Auth(out) => {
            let header = color("[ACCOUNT]", "36", colorize);
            match &out.user {
                Some(user) => {
                    let name = user.display_name.as_deref().unwrap_or(&user.username);
                    writeln!(buf, "{header} {name} <{}>", user.email).ok();
                }
                None => {
                    writeln!(buf, "{header} Not signed in").ok();
                }
            }
            if let Some(message) = &out.message {
                writeln!(buf, "{message}").ok();
            }
        }
        ColorizerOutput::Colorize(out) => {
            let (label, code) = match out.status {
                ColorizeStatus::Completed => ("DONE", "32"),
                ColorizeStatus::Blocked => ("BLOCKED", "33"),
                ColorizeStatus::Cancelled => ("CANCELLED", "33"),
                ColorizeStatus::Ignored => ("BUSY", "33"),
                ColorizeStatus::Denied => ("DENIED", "31"),
            };
            writeln!(buf, "{} Colorize", color(label, code, colorize)).ok();
            if let Some(result) = &out.result {
                writeln!(buf, "Image: {}", result.image_url).ok();
                writeln!(buf, "Id:    {}", result.id).ok();
                writeln!(buf, "Key:   {}", result.record_key).ok();
            }
            if let Some(saved) = &out.saved {
                writeln!(buf, "Saved: {}", saved.gallery_path.display()).ok();
            }
            if let Some(message) = &out.message {
                writeln!(buf, "{message}").ok();
            }
        }
        ColorizerOutput::Images(out) => {
            let header = color("[IMAGES]", "34", colorize);
            writeln!(buf, "{header} {} image(s)", out.count).ok();
            for entry in &out.images {
                writeln!(buf, "- {:24} {}", entry.key, entry.image).ok();
            }
        }
        ColorizerOutput::Delete(out) => {
            writeln!(buf, "{} Deleted {}", color("[IMAGES]", "34", colorize), out.key).ok();
        }
        ColorizerOutput::Save(out) => {
            writeln!(buf, "{} Saved", color("[SAVE]", "32", colorize)).ok();
            writeln!(buf, "- document {}", out.saved.document_path.display()).ok();
            writeln!(buf, "- gallery  {}", out.saved.gallery_path.display()).ok();
        }
        ColorizerOutput::Theme(out) => {
            writeln!(buf, "{} {:?}", color("[THEME]", "35", colorize), out.theme).ok();
        }
        ColorizerOutput::Error(out) => {
            let header = color("[ERROR]", "31", colorize);
            let message = out
                .message
                .as_deref()
                .unwrap_or_else(|| out.error.message.as_str());
            writeln!(buf, "{} {}", header, message).ok();
            for field in &out.error.fields {
                writeln!(buf, "- {}: {}", field.field, field.message).ok();
            }
            if let Some(remediation) = &out.error.remediation {
                writeln!(buf, "Hint: {}", remediation).ok();
            }
        }
    }
    buf
}

/// Apply ANSI color codes when enabled.
fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

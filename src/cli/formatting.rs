//! Formatting utilities for the monitor output.
//!
//! Renders the mixer topology as an indented tree and context events as
//! single colored lines.

use std::{fmt::Write, sync::Arc};

use crate::mixer::{
    ConnectionAttempt, Context, ContextEvent, Device, Stream, StreamControl, Switch,
    types::ControlFlags,
};

/// ANSI color codes for terminal output
pub struct Colors;

impl Colors {
    /// Reset all formatting
    pub const RESET: &'static str = "\x1b[0m";
    /// Bold text
    pub const BOLD: &'static str = "\x1b[1m";
    /// Dim text
    pub const DIM: &'static str = "\x1b[2m";

    /// Red color
    pub const RED: &'static str = "\x1b[31m";
    /// Green color
    pub const GREEN: &'static str = "\x1b[32m";
    /// Yellow color
    pub const YELLOW: &'static str = "\x1b[33m";
    /// Cyan color
    pub const CYAN: &'static str = "\x1b[36m";
}

/// Formats section headers with styling
pub fn format_header(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::CYAN, text, Colors::RESET)
}

/// Formats subheaders with styling
pub fn format_subheader(text: &str) -> String {
    format!(
        "{}{}{}{}",
        Colors::BOLD,
        Colors::YELLOW,
        text,
        Colors::RESET
    )
}

/// Formats descriptions with muted styling
pub fn format_description(text: &str) -> String {
    format!("{}{}{}", Colors::DIM, text, Colors::RESET)
}

/// Formats error messages with red styling
pub fn format_error(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::RED, text, Colors::RESET)
}

/// Renders the graph of a ready context
pub fn format_topology(context: &Context) -> String {
    let mut out = String::new();

    let backend = context.backend_name().unwrap_or("none");
    let _ = writeln!(
        out,
        "{} {} ({}, flags {:?})",
        format_header("Backend:"),
        backend,
        context.backend_type(),
        context.backend_flags()
    );

    let default_input = context.default_input_stream();
    let default_output = context.default_output_stream();
    let is_default = |stream: &Arc<Stream>| {
        [&default_input, &default_output]
            .into_iter()
            .flatten()
            .any(|default| Arc::ptr_eq(default, stream))
    };

    let devices = context.devices();
    let _ = writeln!(out, "{}", format_subheader(&format!("Devices ({})", devices.len())));
    for device in &devices {
        write_device(&mut out, device, &is_default);
    }

    let loose: Vec<_> = context
        .streams()
        .into_iter()
        .filter(|stream| stream.device().is_none())
        .collect();
    if !loose.is_empty() {
        let _ = writeln!(out, "{}", format_subheader("Streams without device"));
        for stream in &loose {
            write_stream(&mut out, stream, is_default(stream), 1);
        }
    }

    let stored = context.stored_controls();
    if !stored.is_empty() {
        let _ = writeln!(out, "{}", format_subheader("Stored controls"));
        for control in &stored {
            let _ = writeln!(
                out,
                "  {} [{}]",
                format_control(control, false),
                control.direction()
            );
        }
    }

    out
}

fn write_device(out: &mut String, device: &Device, is_default: &dyn Fn(&Arc<Stream>) -> bool) {
    let _ = writeln!(
        out,
        "  {}{}{} {}",
        Colors::BOLD,
        device.name(),
        Colors::RESET,
        format_description(device.label())
    );
    for switch in device.switches() {
        let _ = writeln!(out, "    {}", format_switch(&switch));
    }
    for stream in device.streams() {
        write_stream(out, &stream, is_default(&stream), 2);
    }
}

fn write_stream(out: &mut String, stream: &Stream, is_default: bool, depth: usize) {
    let indent = "  ".repeat(depth);
    let marker = if is_default { " (default)" } else { "" };
    let _ = writeln!(
        out,
        "{indent}{}{}{} [{}] {}{marker}",
        Colors::GREEN,
        stream.name(),
        Colors::RESET,
        stream.direction(),
        format_description(stream.label())
    );

    let default = stream.default_control();
    for control in stream.controls() {
        let is_default = default
            .as_ref()
            .is_some_and(|default| Arc::ptr_eq(default, &control));
        let _ = writeln!(out, "{indent}  {}", format_control(&control, is_default));
    }
    for switch in stream.switches() {
        let _ = writeln!(out, "{indent}  {}", format_switch(&switch));
    }
}

/// One line summary of a control: name, volume in percent and mute state
pub fn format_control(control: &StreamControl, is_default: bool) -> String {
    let flags = control.flags();
    let mut line = control.name().to_string();

    if flags.contains(ControlFlags::VOLUME_READABLE) {
        let normal = control.volume_range().normal.max(1);
        let percent = u64::from(control.volume()) * 100 / u64::from(normal);
        let _ = write!(line, " {percent}%");
    }
    if flags.contains(ControlFlags::MUTE_READABLE) && control.mute() {
        let _ = write!(line, " {}muted{}", Colors::RED, Colors::RESET);
    }
    if is_default {
        line.push_str(" (default)");
    }
    line
}

/// One line summary of a switch with the active option starred
pub fn format_switch(switch: &Switch) -> String {
    let active = switch.active_option();
    let options: Vec<String> = switch
        .options()
        .iter()
        .map(|option| {
            let is_active = active
                .as_ref()
                .is_some_and(|active| Arc::ptr_eq(active, option));
            if is_active {
                format!("{}*", option.name())
            } else {
                option.name().to_string()
            }
        })
        .collect();
    format!("{}: {}", switch.name(), options.join(" "))
}

/// One line description of a context event
pub fn format_event(event: &ContextEvent) -> String {
    let name_or_none = |name: &Option<String>| name.clone().unwrap_or_else(|| "none".to_string());

    match event {
        ContextEvent::StateChanged(state) => format!("state -> {state}"),
        ContextEvent::DeviceAdded(name) => format!("{}+ device{} {name}", Colors::GREEN, Colors::RESET),
        ContextEvent::DeviceRemoved(name) => format!("{}- device{} {name}", Colors::RED, Colors::RESET),
        ContextEvent::StreamAdded(name) => format!("{}+ stream{} {name}", Colors::GREEN, Colors::RESET),
        ContextEvent::StreamRemoved(name) => format!("{}- stream{} {name}", Colors::RED, Colors::RESET),
        ContextEvent::StoredControlAdded(name) => {
            format!("{}+ stored control{} {name}", Colors::GREEN, Colors::RESET)
        }
        ContextEvent::StoredControlRemoved(name) => {
            format!("{}- stored control{} {name}", Colors::RED, Colors::RESET)
        }
        ContextEvent::DefaultInputStreamChanged(name) => {
            format!("default input -> {}", name_or_none(name))
        }
        ContextEvent::DefaultOutputStreamChanged(name) => {
            format!("default output -> {}", name_or_none(name))
        }
    }
}

/// Lists the backends tried during the last open
pub fn format_attempts(attempts: &[ConnectionAttempt]) -> String {
    let mut out = format_subheader("Backends tried:");
    for attempt in attempts {
        let _ = write!(
            out,
            "\n  {} ({}): {:?}",
            attempt.backend, attempt.backend_type, attempt.outcome
        );
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mixer::{
        AttemptOutcome, BackendType, ChannelPosition, StreamSwitchRole, SwitchOption, Volume,
        VolumeRange,
    };

    #[test]
    fn control_shows_percent_and_mute() {
        let control = StreamControl::builder("master", "Master")
            .flags(ControlFlags::VOLUME_READABLE | ControlFlags::MUTE_READABLE)
            .channels(vec![ChannelPosition::FrontLeft, ChannelPosition::FrontRight])
            .volume_range(VolumeRange::new(0, 200))
            .volume(Volume::new(vec![100, 50]))
            .mute(true)
            .build();

        let line = format_control(&control, true);

        assert!(line.starts_with("master 50%"));
        assert!(line.contains("muted"));
        assert!(line.ends_with("(default)"));
    }

    #[test]
    fn switch_marks_active_option() {
        let switch = Switch::for_stream("port", "Port", StreamSwitchRole::Port)
            .option(SwitchOption::new("speaker", "Speaker"))
            .option(SwitchOption::new("headphones", "Headphones"))
            .active("headphones")
            .build();

        assert_eq!(format_switch(&switch), "port: speaker headphones*");
    }

    #[test]
    fn default_stream_event_without_stream() {
        let line = format_event(&ContextEvent::DefaultOutputStreamChanged(None));

        assert_eq!(line, "default output -> none");
    }

    #[test]
    fn attempts_list_every_backend() {
        let attempts = vec![
            ConnectionAttempt {
                backend: "PulseAudio".to_string(),
                backend_type: BackendType::PulseAudio,
                outcome: AttemptOutcome::OpenFailed,
            },
            ConnectionAttempt {
                backend: "Null".to_string(),
                backend_type: BackendType::Null,
                outcome: AttemptOutcome::Connected(crate::mixer::State::Ready),
            },
        ];

        let text = format_attempts(&attempts);

        assert!(text.contains("PulseAudio (pulseaudio): OpenFailed"));
        assert!(text.contains("Null (null): Connected(Ready)"));
    }
}

//! Terminal rendering of the graph and the monitor
//!
//! Everything here is a pure function from state to a `String` so the
//! front end only has to print.

use colored::*;
use serde_json::{json, Value};

use crate::graph::{DeviceId, PortRef, PortRow, Snapshot};
use crate::midi::{Event, EventKind};
use crate::monitor::{EventLog, KeyState};

/// Row colours, cycled by device id
const PALETTE: [Color; 5] = [
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::Blue,
];

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

pub fn device_color(device_id: DeviceId) -> Color {
    PALETTE[device_id as usize % PALETTE.len()]
}

/// Scientific pitch name, middle C (60) is `C4`
pub fn note_name(note: u8) -> String {
    let octave = note as i32 / 12 - 1;
    format!("{}{}", NOTE_NAMES[note as usize % 12], octave)
}

fn is_black_key(note: u8) -> bool {
    matches!(note % 12, 1 | 3 | 6 | 8 | 10)
}

fn capability(row: &PortRow<'_>) -> &'static str {
    match (row.port.is_input, row.port.is_output) {
        (true, true) => "in/out",
        (true, false) => "in",
        (false, true) => "out",
        (false, false) => "-",
    }
}

/// Full graph listing: one line per port, its routes, and what it could
/// still be routed to
pub fn render_graph(snapshot: &Snapshot) -> String {
    let hostname = if snapshot.hostname().is_empty() {
        "??"
    } else {
        snapshot.hostname()
    };

    let mut out = format!("{}\n", format!("=== MIDI graph @ {} ===", hostname).bold().cyan());

    let rows = snapshot.rows();
    if rows.is_empty() {
        out.push_str(&format!("  {}\n", "No devices reported".dimmed()));
        return out;
    }

    for row in rows {
        let from = row.port.port_ref();
        let color = device_color(row.device.device_id);
        out.push_str(&format!(
            "  {:>7}  {} {}\n",
            from.to_string().color(color).bold(),
            snapshot.display_name(&from).color(color),
            format!("[{}]", capability(&row)).dimmed(),
        ));

        for dst in row.connected_to {
            let to = dst.port_ref();
            out.push_str(&format!(
                "           {} {} {}\n",
                "->".bright_white(),
                to.to_string().color(device_color(to.device_id)),
                snapshot.display_name(&to),
            ));
        }

        if row.port.is_output && !row.available.is_empty() {
            let available: Vec<String> = row.available.iter().map(|p| p.port_ref().to_string()).collect();
            out.push_str(&format!(
                "           {}\n",
                format!("+ available: {}", available.join(", ")).dimmed()
            ));
        }
    }

    out
}

/// Graph rows as JSON, for scripting
pub fn graph_json(snapshot: &Snapshot) -> Value {
    let rows: Vec<Value> = snapshot
        .rows()
        .iter()
        .map(|row| {
            let from = row.port.port_ref();
            json!({
                "port": from.to_string(),
                "name": snapshot.display_name(&from),
                "is_input": row.port.is_input,
                "is_output": row.port.is_output,
                "connected_to": row.connected_to.iter().map(|p| p.port_ref().to_string()).collect::<Vec<_>>(),
                "available": row.available.iter().map(|p| p.port_ref().to_string()).collect::<Vec<_>>(),
            })
        })
        .collect();

    json!({
        "hostname": snapshot.hostname(),
        "rows": rows,
    })
}

/// Title line for a monitor session
pub fn render_monitor_header(snapshot: &Snapshot, port: PortRef) -> String {
    format!(
        "{} {}\n{}",
        "=== Monitoring".bold().cyan(),
        format!("{} ({}) ===", snapshot.display_name(&port), port).bold().cyan(),
        "Press Ctrl+C to stop".dimmed(),
    )
}

/// One event line, faded when it was already on screen a paint ago
pub fn render_event(event: &Event, faded: bool) -> String {
    let tag = format!("{:<14}", event.kind.tag());
    let tag = match event.kind {
        EventKind::NoteOn { .. } | EventKind::KeyPress { .. } => tag.bright_green(),
        EventKind::NoteOff { .. } => tag.bright_red(),
        EventKind::Controller { .. } => tag.bright_yellow(),
        EventKind::PitchBend { .. } => tag.bright_cyan(),
        EventKind::Aftertouch { .. } | EventKind::ProgramChange { .. } => tag.bright_magenta(),
        EventKind::Unknown { .. } => tag.bright_black(),
    };

    let line = format!("{:>5} {} {}", format!("#{}", event.id), tag, event.kind);
    if faded {
        line.dimmed().to_string()
    } else {
        line
    }
}

/// Up to `limit` events of the log, newest first
pub fn render_log(log: &EventLog, limit: usize) -> String {
    log.iter()
        .take(limit)
        .map(|event| render_event(event, log.is_faded(event.id)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One-line keyboard, `octaves` octaves starting at `base_note`
///
/// Held notes are `#`, released or silent white keys `.` and black keys `:`.
pub fn render_keyboard(keys: &KeyState, base_note: u8, octaves: u8) -> String {
    let last = (base_note as u32 + octaves as u32 * 12).min(128);
    let mut out = format!("{:>4} ", note_name(base_note).dimmed());

    for note in base_note as u32..last {
        let note = note as u8;
        let key = if keys.is_held(note) {
            "#".bright_green().bold()
        } else if is_black_key(note) {
            ":".dimmed()
        } else {
            ".".normal()
        };
        out.push_str(&key.to_string());
    }

    if last > base_note as u32 {
        out.push_str(&format!(" {}", note_name((last - 1) as u8).dimmed()));
    }
    out
}

//! Formatted output helpers for CLI commands.
//!
//! Tables are left-aligned columns padded to the widest cell, separated by
//! two spaces.

use std::fmt::Write;

use burrow_network::Network;
use burrow_runtime::state::ContainerRecord;

/// Formats a byte count into a human-readable string (e.g., "128 MiB").
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn push_line<'a>(out: &mut String, widths: &[usize], cells: impl Iterator<Item = &'a str>) {
    let mut text = String::new();
    for (cell, width) in cells.zip(widths.iter().copied()) {
        let _ = write!(text, "{cell:<width$}  ");
    }
    out.push_str(text.trim_end());
    out.push('\n');
}

fn render<const N: usize>(header: [&str; N], rows: &[[String; N]]) -> String {
    let mut widths = header.map(str::len);
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }
    let mut out = String::new();
    push_line(&mut out, &widths, header.into_iter());
    for row in rows {
        push_line(&mut out, &widths, row.iter().map(String::as_str));
    }
    out
}

/// Renders containers as `ID NAME PID STATUS COMMAND CREATED`.
#[must_use]
pub fn container_table(records: &[ContainerRecord]) -> String {
    let rows: Vec<[String; 6]> = records
        .iter()
        .map(|r| {
            [
                r.id.to_string(),
                r.name.clone(),
                r.pid.clone(),
                r.status.to_string(),
                r.command.clone(),
                r.created_time.clone(),
            ]
        })
        .collect();
    render(["ID", "NAME", "PID", "STATUS", "COMMAND", "CREATED"], &rows)
}

/// Renders networks as `NAME SUBNET GATEWAY DRIVER`.
#[must_use]
pub fn network_table(networks: &[&Network]) -> String {
    let rows: Vec<[String; 4]> = networks
        .iter()
        .map(|n| {
            [
                n.name.clone(),
                n.subnet.to_string(),
                n.gateway.to_string(),
                n.driver.clone(),
            ]
        })
        .collect();
    render(["NAME", "SUBNET", "GATEWAY", "DRIVER"], &rows)
}

#[cfg(test)]
mod tests {
    use burrow_common::types::ContainerId;

    use super::*;

    #[test]
    fn format_bytes_displays_bytes() {
        assert_eq!(format_bytes(512), "512 B");
    }

    #[test]
    fn format_bytes_displays_kib() {
        assert_eq!(format_bytes(2048), "2.0 KiB");
    }

    #[test]
    fn format_bytes_displays_mib() {
        assert_eq!(format_bytes(134_217_728), "128.0 MiB");
    }

    #[test]
    fn empty_table_has_only_header() {
        assert_eq!(container_table(&[]), "ID  NAME  PID  STATUS  COMMAND  CREATED\n");
    }

    #[test]
    fn columns_align_to_widest_cell() {
        let mut record = ContainerRecord::running(
            ContainerId::new("0123456789"),
            "web",
            4242,
            "/bin/sh -c top",
            None,
            Vec::new(),
        );
        record.created_time = "2024-05-01 10:00:00".into();
        let table = container_table(&[record]);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(
            lines,
            [
                "ID          NAME  PID   STATUS   COMMAND         CREATED",
                "0123456789  web   4242  running  /bin/sh -c top  2024-05-01 10:00:00",
            ]
        );
    }
}

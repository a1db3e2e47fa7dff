//! Table output for CLI commands.

use ath_protocol::SampleStatus;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};

/// Display color for a sample status
pub fn status_color(status: SampleStatus) -> Color {
    match status {
        SampleStatus::Uploading => Color::Grey,
        SampleStatus::Parsing | SampleStatus::Processing | SampleStatus::Rendering => Color::Cyan,
        SampleStatus::Done => Color::Green,
        SampleStatus::Failed => Color::Red,
    }
}

/// Print a table with custom column colors
pub fn print_table_colored(headers: &[&str], rows: Vec<Vec<(String, Option<Color>)>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        let cells: Vec<Cell> = row
            .into_iter()
            .map(|(text, color)| {
                let cell = Cell::new(text);
                if let Some(c) = color {
                    cell.fg(c)
                } else {
                    cell
                }
            })
            .collect();
        table.add_row(cells);
    }

    println!("{}", table);
}

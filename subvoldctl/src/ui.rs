//! Table rendering for list-shaped responses, adapted from `blkcaptctl::ui`.
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};

pub fn print_comfy_table(header: Vec<Cell>, rows: impl Iterator<Item = Vec<Cell>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);

    rows.for_each(|r| {
        table.add_row(r);
    });

    println!("{}", table);
}

pub fn print_err(err: &str) {
    if !err.is_empty() {
        eprintln!("error: {}", err);
    }
}

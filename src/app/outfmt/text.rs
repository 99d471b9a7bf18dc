use std::io::Write;

use tabled::settings::{
    object::{Cell, Columns, Rows},
    style::On,
    Alignment, Border,
};

use crate::{portfolio::render::RenderTable, util::rw::WriteHandle};

use super::model::{Error, OutputType, ReportWriter};

pub struct TextWriter {
    w: WriteHandle,
}

impl TextWriter {
    pub fn new(w: WriteHandle) -> TextWriter {
        TextWriter { w }
    }
}

struct CellBorder {
    top: char,
    bottom: char,
    left: char,
    right: char,
    corner: char,
}

impl CellBorder {
    fn to_border(&self) -> Border<On, On, On, On> {
        Border::full(self.top, self.bottom, self.left, self.right,
                     self.corner, self.corner, self.corner, self.corner)
    }

    fn none() -> CellBorder {
        CellBorder { top: ' ', bottom: ' ', left: ' ', right: ' ', corner: ' ' }
    }
}

impl Default for CellBorder {
    fn default() -> Self {
        CellBorder { top: '-', bottom: '-', left: '|', right: '|', corner: '+' }
    }
}

fn build_table(table_model: &RenderTable) -> tabled::Table {
    let mut table_bldr = tabled::builder::Builder::default();
    table_bldr.push_record(table_model.header.clone());
    let n_rows = table_model.rows.len();
    for row in &table_model.rows {
        table_bldr.push_record(row.clone());
    }

    let footer_sep_row: Option<usize> = if !table_model.footer.is_empty() {
        table_bldr.push_record(vec![String::new(); table_model.footer.len()]);
        table_bldr.push_record(table_model.footer.clone());
        Some(1 + n_rows)
    } else {
        None
    };

    let mut table = table_bldr.build();
    table.with(tabled::settings::Style::ascii());
    for col in &table_model.numeric_cols {
        table.modify(Columns::single(*col), Alignment::right());
    }
    table.modify(Rows::first(), Alignment::center());

    // The footer sits under the main table as a smaller table, separated by
    // a blank row. Only its non-empty cells get borders.
    if let Some(sep_row) = footer_sep_row {
        let footer_row = sep_row + 1;
        table.modify(Rows::single(sep_row), Border::new().set_left(' ').set_right(' '));
        table.modify(Rows::single(footer_row), CellBorder::none().to_border());
        for (col, footer_cell) in table_model.footer.iter().enumerate() {
            if !footer_cell.is_empty() {
                table.modify(Cell::new(sep_row, col), CellBorder::default().to_border());
                table.modify(Cell::new(footer_row, col), CellBorder::default().to_border());
            }
        }
    }
    table
}

impl ReportWriter for TextWriter {
    fn print_render_table(
        &mut self,
        out_type: OutputType,
        name: &str,
        table_model: &RenderTable,
    ) -> Result<(), Error> {
        let map_write_err = |e| format!("{e}");

        let title = match out_type {
            OutputType::YearlyGains => name.to_string(),
            OutputType::OptionsReport => format!("Options Transactions {}", name),
            OutputType::AggregateGains => format!("Aggregate Gains {}", name),
        };
        writeln!(self.w, "{}", title).map_err(map_write_err)?;

        for err in &table_model.errors {
            writeln!(self.w, "[!] {}", err).map_err(map_write_err)?;
        }
        for line in &table_model.preamble {
            writeln!(self.w, "{}", line).map_err(map_write_err)?;
        }

        if !table_model.header.is_empty() {
            writeln!(self.w, "{}", build_table(table_model)).map_err(map_write_err)?;
        }

        for note in &table_model.notes {
            writeln!(self.w, "{note}").map_err(map_write_err)?;
        }

        writeln!(self.w, "").map_err(map_write_err)?;
        Ok(())
    }

    fn print_message(&mut self, msg: &str) -> Result<(), Error> {
        writeln!(self.w, "{}", msg).map_err(|e| format!("{e}"))
    }
}

use std::{fs::File, io, path::PathBuf};

use crate::portfolio::render::RenderTable;
use crate::util::os::mk_writable_dir;
use crate::util::rw::WriteHandle;
use crate::write_errln;

use super::model::{Error, OutputType, ReportWriter};

/// Writes each table to its own csv file in `out_dir`.
pub struct CsvWriter {
    out_dir: PathBuf,
    // Free-standing messages still go to the console
    msg_stream: WriteHandle,
}

impl CsvWriter {
    pub fn new(out_dir: &str, msg_stream: WriteHandle) -> Result<CsvWriter, io::Error> {
        let dir_path = PathBuf::from(out_dir);
        mk_writable_dir(&dir_path)?;
        Ok(CsvWriter { out_dir: dir_path, msg_stream })
    }

    pub fn file_name(out_type: &OutputType, name: &str) -> String {
        match out_type {
            OutputType::YearlyGains => format!("{name}.csv"),
            OutputType::OptionsReport => format!("options-{name}.csv"),
            OutputType::AggregateGains => format!("aggregate-gains-{name}.csv"),
        }
    }
}

pub fn write_render_table_csv(
    table_model: &RenderTable,
    writer: &mut dyn io::Write,
) -> Result<(), Error> {
    let mut csv_w = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(writer);
    let map_err = |e: csv::Error| e.to_string();

    if !table_model.header.is_empty() {
        csv_w.write_record(&table_model.header).map_err(map_err)?;
    }
    for row in &table_model.rows {
        csv_w.write_record(row).map_err(map_err)?;
    }
    if !table_model.footer.is_empty() {
        csv_w.write_record(&table_model.footer).map_err(map_err)?;
    }

    // Errors, then notes, each as a single-cell row
    for line in table_model.errors.iter().chain(table_model.notes.iter()) {
        csv_w.write_record([line]).map_err(map_err)?;
    }

    csv_w.flush().map_err(|e| e.to_string())?;
    Ok(())
}

impl ReportWriter for CsvWriter {
    fn print_render_table(
        &mut self,
        out_type: OutputType,
        name: &str,
        table_model: &RenderTable,
    ) -> Result<(), Error> {
        let file_path = self.out_dir.join(Self::file_name(&out_type, name));
        let mut fp = File::create(&file_path).map_err(|e| {
            format!("Failed to create {}: {}", file_path.display(), e)
        })?;
        write_render_table_csv(table_model, &mut fp)
    }

    fn print_message(&mut self, msg: &str) -> Result<(), Error> {
        write_errln!(self.msg_stream, "{}", msg);
        Ok(())
    }
}

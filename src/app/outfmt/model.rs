use crate::portfolio::render::RenderTable;

pub enum OutputType {
    // Per security, for the tax year
    YearlyGains,
    OptionsReport,
    AggregateGains,
}

pub type Error = String;

pub trait ReportWriter {
    fn print_render_table(
        &mut self,
        out_type: OutputType,
        name: &str,
        table_model: &RenderTable,
    ) -> Result<(), Error>;

    /// A free-standing line of output, not part of any table.
    fn print_message(&mut self, _msg: &str) -> Result<(), Error> {
        Ok(())
    }
}

use anyhow::Result;

fn main() -> Result<()> {
    workbook_audit::cli::run()
}

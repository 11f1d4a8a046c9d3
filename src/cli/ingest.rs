use std::path::PathBuf;

use crate::error::{FblrError, Result};
use crate::pipeline::process_file;
use crate::settings::load_settings;
use crate::store::{get_connection, init_db};

pub fn run(files: &[String]) -> Result<()> {
    let settings = load_settings();
    let mut conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;

    let mut failed = 0usize;
    for file in files {
        let path = PathBuf::from(file);
        match process_file(&settings, &mut conn, &path) {
            Ok(report) => {
                println!(
                    "{}: {} parsed, {} valid, {} unique, {} merged",
                    report.file_name, report.parsed, report.valid, report.unique, report.merged
                );
            }
            Err(e) => {
                eprintln!("{file}: {e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(FblrError::Other(format!(
            "{failed} of {} file(s) failed",
            files.len()
        )));
    }
    Ok(())
}

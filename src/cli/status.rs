use crate::error::Result;
use crate::settings::load_settings;
use crate::store::{get_connection, init_db, status};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;

    let s = status(&conn)?;
    println!("Ledger lines: {}", s.rows);
    println!("Source files: {}", s.files);
    match s.latest_file_date {
        Some(date) => println!("Latest file date: {date}"),
        None => println!("Latest file date: none"),
    }
    Ok(())
}

use std::path::PathBuf;

use crate::error::Result;
use crate::settings::{save_settings, Settings};
use crate::store::{get_connection, init_db};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let settings = match data_dir {
        Some(dir) => Settings {
            data_dir: dir,
            ..Default::default()
        },
        None => Settings::default(),
    };

    std::fs::create_dir_all(PathBuf::from(&settings.data_dir))?;
    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;
    save_settings(&settings)?;

    println!("Initialized fblr in {}", settings.data_dir);
    println!(
        "Source system: {}, database: {}",
        settings.system_name, settings.database
    );
    Ok(())
}

use anyhow::Result;

/// Create an empty SQLite database with the import tables for local runs:
/// point `connection.path` at it with `type: sqlite`.
fn main() -> Result<()> {
    let path = std::path::Path::new("dev/sqlite");
    std::fs::create_dir_all(path)?;
    let db_path = path.join("alojamientos.db");
    let conn = rusqlite::Connection::open(&db_path)?;
    conn.execute_batch(
        "DROP TABLE IF EXISTS establecimiento;
         DROP TABLE IF EXISTS categoria;
         DROP TABLE IF EXISTS barrio;",
    )?;
    conn.execute_batch(include_str!("../db/schema.sql"))?;
    println!("Created empty import tables in {}", db_path.display());
    Ok(())
}

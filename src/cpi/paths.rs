use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct CpiPaths {
    pub datasets_dir: PathBuf,
    pub table_file: PathBuf,
    pub daily_file: PathBuf,
    pub logs_dir: PathBuf,
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> CpiPaths {
    let datasets_dir = env_or_default_path("CPI_DATASETS_DIR", PathBuf::from("datasets"));
    let table_file = env_or_default_path("CPI_TABLE_FILE", datasets_dir.join("CPI_U.csv"));
    let daily_file = env_or_default_path(
        "CPI_DAILY_FILE",
        datasets_dir.join("daily_cpi_inflation.csv"),
    );
    let logs_dir = env_or_default_path("CPI_LOGS_DIR", datasets_dir.join("logs"));

    CpiPaths {
        datasets_dir,
        table_file,
        daily_file,
        logs_dir,
    }
}

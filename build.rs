use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

// `CPI_`-prefixed tokens in the sources that are not environment keys.
const NOT_ENV_KEYS: &[&str] = &["CPI_WARN"];

fn collect_rs_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_rs_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            out.push(path);
        }
    }
    Ok(())
}

/// Upper-snake tokens starting with `CPI_`. Splitting on every non-key
/// character keeps `GENERATED_CPI_...` style identifiers out.
fn env_keys_in(source: &str) -> impl Iterator<Item = &str> {
    source
        .split(|c: char| !(c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'))
        .filter(|token| token.len() > "CPI_".len() && token.starts_with("CPI_"))
        .filter(|token| !NOT_ENV_KEYS.contains(token))
}

fn main() -> std::io::Result<()> {
    let mut rs_files = Vec::new();
    collect_rs_files(Path::new("src"), &mut rs_files)?;

    let mut keys = BTreeSet::new();
    for file in &rs_files {
        let content = fs::read_to_string(file)?;
        keys.extend(env_keys_in(&content).map(str::to_string));
    }

    let out_dir = env::var_os("OUT_DIR").map(PathBuf::from).ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR is not set")
    })?;
    let mut f = fs::File::create(out_dir.join("cpi_env_allowlist.rs"))?;
    writeln!(f, "pub const GENERATED_CPI_ENV_ALLOWLIST: &[&str] = &[")?;
    for key in &keys {
        writeln!(f, "    {key:?},")?;
    }
    writeln!(f, "];")?;

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src");
    Ok(())
}

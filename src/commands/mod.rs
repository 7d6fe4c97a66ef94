pub mod cpi_densify;
pub mod cpi_status;
pub mod cpi_update;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn render_text(&self) -> String {
        let mut out = format!("{}: {}\n", self.command, if self.ok { "ok" } else { "failed" });
        for detail in &self.details {
            out.push_str(&format!("  {detail}\n"));
        }
        for issue in &self.issues {
            out.push_str(&format!("  issue: {issue}\n"));
        }
        out
    }
}

pub fn format_years<'a>(years: impl IntoIterator<Item = &'a i32>) -> String {
    let joined = years
        .into_iter()
        .map(i32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("[{joined}]")
}

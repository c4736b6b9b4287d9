use chrono::{Local, NaiveDateTime};

/// Largest document opened into a tab (10 MiB)
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Extensions treated as editable text
pub const TEXT_FILE_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "json", "js", "ts", "jsx", "tsx", "css", "scss", "html", "xml",
    "yaml", "yml", "toml", "ini", "conf", "config", "log", "csv", "py", "rb", "go", "rs", "c",
    "cpp", "h", "hpp", "java", "kt", "swift", "php", "sh", "bash", "zsh", "fish",
];

/// Suggested name for a new unsaved document created now
pub fn default_file_name() -> String {
    format_default_file_name(Local::now().naive_local())
}

/// `notes_DDMMYYYY_HHMMSS.txt` for the given local instant. Two documents
/// created within the same second get the same name.
pub fn format_default_file_name(instant: NaiveDateTime) -> String {
    instant.format("notes_%d%m%Y_%H%M%S.txt").to_string()
}

/// Whether `name` carries one of the known text extensions
pub fn is_text_file(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            TEXT_FILE_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

//! Display identity of a supervised process.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub alias: String,
    pub pid: u32,
    pub display_label: String,
}

impl ProcessIdentity {
    /// Label is the alias when given, otherwise the executable's base name.
    pub fn new(alias: &str, program: &str, pid: u32) -> Self {
        let base = if alias.is_empty() {
            executable_base_name(program)
        } else {
            alias.to_string()
        };
        Self {
            alias: alias.to_string(),
            pid,
            display_label: format!("{base}:{pid}"),
        }
    }
}

/// File name of `program` without a trailing `.exe` or `.cmd`.
pub fn executable_base_name(program: &str) -> String {
    // Split on both separators so Windows paths work everywhere.
    let name = program
        .rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .unwrap_or(program);
    let name = name.strip_suffix(".exe").unwrap_or(name);
    let name = name.strip_suffix(".cmd").unwrap_or(name);
    name.to_string()
}

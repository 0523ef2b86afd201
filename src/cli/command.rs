#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP API until interrupted.
    Serve,
    /// Registered tables and their insert defaults.
    Tables,
    /// Collections present in the store, with record counts.
    Collections,
    /// Validate and print the effective configuration.
    CheckConfig,
}

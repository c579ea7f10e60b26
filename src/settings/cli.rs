use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "authgate", about = "Token authentication service")]
pub struct Cli {
    /// Path to a settings file, without or with the `.toml` extension.
    #[arg(long)]
    pub settings: Option<String>,
}

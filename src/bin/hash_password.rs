//! Prints an Argon2id PHC string for `credentials.seed` entries or manual
//! inserts into `auth_credential`.
//!
//! $ cargo run --bin hash_password -- --password 'correct horse'
//! $ echo 'correct horse' | cargo run --bin hash_password

use authgate::application_impl::Argon2PasswordHasher;
use authgate::application_port::CredentialHasher;
use clap::Parser;
use std::io::BufRead;

#[derive(Parser, Debug)]
#[command(name = "hash_password", about = "Hash a secret with Argon2id")]
struct Args {
    /// Secret to hash; read from stdin when omitted.
    #[arg(long)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let password = match args.password {
        Some(password) => password,
        None => {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        return Err(anyhow::anyhow!("empty password"));
    }

    let hash = Argon2PasswordHasher.hash_password(&password).await?;
    println!("{}", hash);
    Ok(())
}

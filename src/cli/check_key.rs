//! Check-key command - validates a key locally

use clap::Args;

use crate::infrastructure::api_key::ApiKeyGenerator;

#[derive(Args, Debug)]
pub struct CheckKeyArgs {
    /// The full API key
    pub key: String,
}

/// Prints whether the key is well formed and its displayable prefix
pub fn run(args: CheckKeyArgs) -> anyhow::Result<()> {
    let key = args.key.trim();

    match ApiKeyGenerator::validate_format(key) {
        Ok(()) => {
            println!("valid: prefix {}", ApiKeyGenerator::prefix_of(key));
            Ok(())
        }
        Err(e) => anyhow::bail!("invalid key: {}", e),
    }
}

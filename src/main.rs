use std::path::PathBuf;

use anyhow::{bail, Context, Error};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use clap::Parser;
use clap_stdin::MaybeStdin;
use dc_verifier::{
    dc_api::{GeneratedRequest, PresentationOptions, RequestBuilder, Verifier},
    nonce::{NonceCodec, SECRET_LEN},
    VerifierConfig,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON verifier configuration. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Base64url encoded 32 byte server secret that seals nonces.
    #[arg(long, env = "DC_VERIFIER_SECRET", hide_env_values = true, global = true)]
    secret: Option<String>,
    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, clap::Subcommand)]
enum Action {
    /// Build a Digital Credentials API request from JSON presentation options.
    CreateRequest {
        /// PresentationOptions as JSON, or `-` for stdin.
        options: MaybeStdin<String>,
    },
    /// Verify a Digital Credentials API response.
    Verify {
        /// The response object as JSON, or `-` for stdin.
        response: MaybeStdin<String>,
        /// The nonce of the request that produced the response.
        #[arg(long)]
        nonce: String,
        /// The request as printed by `create-request`, to verify against its DCQL query.
        #[arg(long)]
        request: Option<PathBuf>,
    },
    /// Decrypt a nonce and print its expiry.
    OpenNonce { nonce: MaybeStdin<String> },
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => VerifierConfig::from_json_file(path)
            .with_context(|| format!("could not load config from {}", path.display()))?,
        None => VerifierConfig::default(),
    };
    let secret = decode_secret(args.secret.as_deref())?;

    let output = match args.action {
        Action::CreateRequest { options } => create_request(config, &secret, &options)?,
        Action::Verify {
            response,
            nonce,
            request,
        } => verify(config, &secret, &response, &nonce, request)?,
        Action::OpenNonce { nonce } => open_nonce(&secret, nonce.trim())?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn decode_secret(secret: Option<&str>) -> Result<Vec<u8>, Error> {
    let Some(secret) = secret else {
        bail!("a server secret is required, pass --secret or set DC_VERIFIER_SECRET");
    };
    let secret = URL_SAFE_NO_PAD
        .decode(secret.trim().trim_end_matches('='))
        .context("server secret is not base64url")?;
    if secret.len() != SECRET_LEN {
        bail!("server secret must be {SECRET_LEN} bytes, got {}", secret.len());
    }
    Ok(secret)
}

fn create_request(config: VerifierConfig, secret: &[u8], options: &str) -> Result<Value, Error> {
    let options: PresentationOptions =
        serde_json::from_str(options).context("could not parse presentation options")?;
    let generated = RequestBuilder::new(config).build(&options, secret)?;
    Ok(serde_json::to_value(generated)?)
}

fn verify(
    config: VerifierConfig,
    secret: &[u8],
    response: &str,
    nonce: &str,
    request: Option<PathBuf>,
) -> Result<Value, Error> {
    let query = match request {
        Some(path) => {
            let request: GeneratedRequest = serde_json::from_str(
                &std::fs::read_to_string(&path)
                    .with_context(|| format!("could not read {}", path.display()))?,
            )
            .context("could not parse request")?;
            let data = request
                .request
                .openid4vp()
                .context("request has no openid4vp entry")?;
            Some(data.dcql_query.clone())
        }
        None => None,
    };
    let response: Value = serde_json::from_str(response).context("response is not JSON")?;
    let outcome = Verifier::new(config).verify(&response, nonce, secret, query.as_ref())?;
    let failures: serde_json::Map<String, Value> = outcome
        .failures
        .iter()
        .map(|(id, e)| {
            (
                id.clone(),
                json!({ "kind": e.kind().to_string(), "message": e.message() }),
            )
        })
        .collect();
    Ok(json!({ "credentials": outcome.credentials, "failures": failures }))
}

fn open_nonce(secret: &[u8], nonce: &str) -> Result<Value, Error> {
    let payload = NonceCodec::new(secret)?.open(nonce)?;
    Ok(json!({
        "expiresOn": payload.expires_on.format(&time::format_description::well_known::Rfc3339)?,
        "encryptedResponse": payload.response_encryption_keys.is_some(),
    }))
}

//! # Request Subcommand
//!
//! Prints the signed JSON body for one server endpoint, ready to `PUT`.
//! Each body carries the endpoint's fields plus `nonce`,
//! `public_key_id` and `signature`; the signature covers the endpoint's
//! fields in their protocol order followed by the nonce.
//!
//! | Kind | Path | Signed fields |
//! |---|---|---|
//! | `user` | `/v1/user/{ns}` | username, email, public_key |
//! | `group` | `/v1/group/{ns}` | kid, name |
//! | `member` | `/v1/group/{ns}/{group}/member` | kid, group, member_kid |
//! | `module` | `/v1/module/{ns}` | kid, name, admin_group |
//! | `question` | `/v1/question/{ns}/{module}/{name}` | kid, module, name, data, max_try |
//! | `answer` | `/v1/answer/{ns}/{module}/{name}` | kid, module, name, group_name, data |

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use clap::{Args, Subcommand};
use grader_crypto::RequestSigner;
use serde_json::{json, Value};

use crate::KeyOpts;

/// Arguments for the `grader request` subcommand.
#[derive(Args, Debug)]
pub struct RequestArgs {
    #[command(flatten)]
    pub key: KeyOpts,

    /// Nonce to sign with. Defaults to the current Unix time.
    #[arg(long)]
    pub nonce: Option<i64>,

    #[command(subcommand)]
    pub kind: RequestKind,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RequestKind {
    /// Register or update the user owning this key.
    User {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        /// Signature by the previously registered key, for key rotation.
        #[arg(long)]
        reset_signature: Option<String>,
    },
    /// Create or touch a group.
    Group {
        #[arg(long)]
        name: String,
    },
    /// Add a member to a group.
    Member {
        #[arg(long)]
        group: String,
        #[arg(long)]
        member_kid: String,
    },
    /// Create or touch a module.
    Module {
        #[arg(long)]
        name: String,
        #[arg(long)]
        admin_group: String,
    },
    /// Create or update a question; `--data` is the grader file.
    Question {
        #[arg(long)]
        module: String,
        #[arg(long)]
        name: String,
        #[arg(long, value_name = "FILE")]
        data: PathBuf,
        #[arg(long, default_value_t = 0)]
        max_try: i64,
    },
    /// Submit an answer; `--data` is the answer file.
    Answer {
        #[arg(long)]
        module: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        group: String,
        #[arg(long, value_name = "FILE")]
        data: PathBuf,
    },
}

/// Execute the request subcommand.
pub fn run_request(args: &RequestArgs) -> Result<u8> {
    let signer = args.key.signer()?;
    let body = build_request(&signer, &args.kind, args.nonce)?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(0)
}

fn read_b64(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(BASE64.encode(bytes))
}

/// Build the signed body for one endpoint.
pub fn build_request(signer: &RequestSigner, kind: &RequestKind, nonce: Option<i64>) -> Result<Value> {
    let kid = signer.key_id()?;
    let kid = kid.as_str();

    let (fields, mut body) = match kind {
        RequestKind::User {
            username,
            email,
            reset_signature,
        } => {
            let public_key = signer.public_key_b64()?;
            let mut body = json!({
                "username": username,
                "email": email,
                "public_key": public_key,
            });
            if let Some(reset) = reset_signature {
                body["reset_signature"] = json!(reset);
            }
            (vec![username.clone(), email.clone(), public_key], body)
        }
        RequestKind::Group { name } => (
            vec![kid.to_string(), name.clone()],
            json!({ "name": name }),
        ),
        RequestKind::Member { group, member_kid } => (
            vec![kid.to_string(), group.clone(), member_kid.clone()],
            json!({ "member_kid": member_kid }),
        ),
        RequestKind::Module { name, admin_group } => (
            vec![kid.to_string(), name.clone(), admin_group.clone()],
            json!({ "name": name, "admin_group": admin_group }),
        ),
        RequestKind::Question {
            module,
            name,
            data,
            max_try,
        } => {
            let data = read_b64(data)?;
            (
                vec![
                    kid.to_string(),
                    module.clone(),
                    name.clone(),
                    data.clone(),
                    max_try.to_string(),
                ],
                json!({ "data": data, "max_try": max_try }),
            )
        }
        RequestKind::Answer {
            module,
            name,
            group,
            data,
        } => {
            let data = read_b64(data)?;
            (
                vec![
                    kid.to_string(),
                    module.clone(),
                    name.clone(),
                    group.clone(),
                    data.clone(),
                ],
                json!({ "group_name": group, "data": data }),
            )
        }
    };

    let signed = serde_json::to_value(signer.sign_fields(&fields, nonce)?)?;
    if let (Value::Object(map), Value::Object(signed)) = (&mut body, signed) {
        map.extend(signed);
        // Registration carries the key itself; the id is derived server-side.
        if matches!(kind, RequestKind::User { .. }) {
            map.remove("public_key_id");
        }
    }
    tracing::debug!(fields = ?fields, "signed request body");
    Ok(body)
}
